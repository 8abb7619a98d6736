/// An entry in the error code registry.
pub struct ErrorEntry {
    pub code: &'static str,
    pub short: &'static str,  // one-line summary, attached to diagnostics as a note
    pub long: &'static str,   // full explanation for --explain
}

/// All stable diagnostic codes emitted by `lpd`.
pub static REGISTRY: &[ErrorEntry] = &[
    // ── Lexer ────────────────────────────────────────────────────────────────
    ErrorEntry {
        code: "LPD-L001",
        short: "unexpected character",
        long: r#"## LPD-L001: unexpected character

A character was found that cannot start any LPD token.

**Example:**

    programa t; var a$: inteiro;

`$` is not part of the language. Identifiers contain letters, digits
and `_`, and must start with a letter.
"#,
    },
    ErrorEntry {
        code: "LPD-L002",
        short: "integer literal out of range",
        long: r#"## LPD-L002: integer literal out of range

Integer literals must fit in a signed 32-bit word (at most 2147483647).
Negative values are written with a unary minus: `-5`.

**Example:**

    a := 99999999999
"#,
    },

    // ── Grammar ──────────────────────────────────────────────────────────────
    ErrorEntry {
        code: "LPD-P001",
        short: "unexpected token",
        long: r#"## LPD-P001: unexpected token

The grammar required a specific token here and found another one.

**Common causes:**
- a missing `;` after the program name or a declaration
- `=` written instead of `:=` in an assignment
- a missing `entao` after a `se` condition or `faca` after `enquanto`

**Example:**

    programa t
    inicio fim.

The program header must end with `;`.
"#,
    },
    ErrorEntry {
        code: "LPD-P002",
        short: "unexpected end of input",
        long: r#"## LPD-P002: unexpected end of input

The source ended while a construct was still open, usually a block
without its `fim` or a program without the final `.`.
"#,
    },
    ErrorEntry {
        code: "LPD-P003",
        short: "text after the end of the program",
        long: r#"## LPD-P003: text after the end of the program

A program ends with `fim.` and nothing but whitespace and comments may
follow it.
"#,
    },
    ErrorEntry {
        code: "LPD-P004",
        short: "expected a type",
        long: r#"## LPD-P004: expected a type

Variable declarations and function headers need a type: `inteiro` or
`booleano`.

**Example:**

    var a: real;
"#,
    },
    ErrorEntry {
        code: "LPD-P005",
        short: "expected a statement",
        long: r#"## LPD-P005: expected a statement

Statements start with an identifier (assignment or procedure call),
`se`, `enquanto`, `para`, `leia`, `escreva` or a nested `inicio`.
"#,
    },
    ErrorEntry {
        code: "LPD-P006",
        short: "expected an operand",
        long: r#"## LPD-P006: expected an operand

An expression needs a number, identifier, `verdadeiro`, `falso` or a
parenthesised expression where an operator was found instead.

**Example:**

    a := 1 + * 2
"#,
    },

    // ── Semantics ────────────────────────────────────────────────────────────
    ErrorEntry {
        code: "LPD-S001",
        short: "duplicate symbol",
        long: r#"## LPD-S001: duplicate symbol

A name was declared twice where it would be ambiguous.

At program level a name may not repeat any visible name, including the
program name. Inside a procedure or function a name only has to be
unique within that routine, so locals may shadow globals. A nested
routine may not reuse the name of the routine that encloses it.
"#,
    },
    ErrorEntry {
        code: "LPD-S002",
        short: "undefined symbol",
        long: r#"## LPD-S002: undefined symbol

A name was used that is not declared in the current scope or any
enclosing one. Locals of a procedure are not visible after its `fim`.
"#,
    },
    ErrorEntry {
        code: "LPD-S003",
        short: "wrong kind of symbol",
        long: r#"## LPD-S003: wrong kind of symbol

The name refers to something that cannot be used this way, for example
a variable written as a statement or a procedure used as an operand.
A `para` loop needs an `inteiro` variable.
"#,
    },
    ErrorEntry {
        code: "LPD-S004",
        short: "type mismatch",
        long: r#"## LPD-S004: type mismatch

Arithmetic and ordering operators need `inteiro` operands; `e`, `ou` and
`nao` need `booleano`; `=` and `<>` compare two values of the same type.
Conditions must be `booleano`, and an assignment must store a value of
the target's type.

**Example:**

    var a: inteiro;
    inicio a := verdadeiro fim.
"#,
    },
    ErrorEntry {
        code: "LPD-S005",
        short: "assignment to a procedure",
        long: r#"## LPD-S005: assignment to a procedure

Procedures have no value. Only variables and, inside its own body, a
function's name may appear on the left of `:=`.
"#,
    },
    ErrorEntry {
        code: "LPD-S006",
        short: "return outside the function's own body",
        long: r#"## LPD-S006: return outside the function's own body

`f := expr` sets the return value of `f` and leaves it. It is only
allowed directly in the body of `f`, not in other routines or in the
main program.
"#,
    },
    ErrorEntry {
        code: "LPD-S007",
        short: "invalid read or write target",
        long: r#"## LPD-S007: invalid read or write target

`leia` and `escreva` take a single `inteiro` variable.
"#,
    },
    ErrorEntry {
        code: "LPD-S008",
        short: "invalid expression",
        long: r#"## LPD-S008: invalid expression

The expression is malformed: an operator lacks an operand, a
parenthesis is unbalanced or two operands follow each other.
"#,
    },
    ErrorEntry {
        code: "LPD-S009",
        short: "unexpected token",
        long: r#"## LPD-S009: unexpected token

The token stream does not have the expected structure at this point.
This normally only happens when the token stream was produced by
something other than the grammar recognizer.
"#,
    },
    ErrorEntry {
        code: "LPD-S010",
        short: "function called as a statement",
        long: r#"## LPD-S010: function called as a statement

A function's value must be used. Call it inside an expression:

    r := f
"#,
    },
    ErrorEntry {
        code: "LPD-S011",
        short: "internal code generation error",
        long: r#"## LPD-S011: internal code generation error

The code generator met a tree it cannot translate even though semantic
analysis accepted it. This is a compiler bug, not a problem in the
program.
"#,
    },

    // ── Object text ──────────────────────────────────────────────────────────
    ErrorEntry {
        code: "LPD-O001",
        short: "wrong number of operands",
        long: r#"## LPD-O001: wrong number of operands

`LDC`, `LDV`, `STR`, `JMP`, `JMPF`, `CALL` and `RETURNF` take one
operand; `ALLOC` and `DALLOC` take two (`base,count`); every other
instruction takes none.
"#,
    },
    ErrorEntry {
        code: "LPD-O002",
        short: "invalid operand",
        long: r#"## LPD-O002: invalid operand

Addresses and counts must be non-negative integers and `LDC` needs a
32-bit integer.
"#,
    },
    ErrorEntry {
        code: "LPD-O003",
        short: "malformed label line",
        long: r#"## LPD-O003: malformed label line

A line that starts in the first column defines a label: the label name,
optionally followed by `NULL`. Instructions must be indented.
"#,
    },
    ErrorEntry {
        code: "LPD-O004",
        short: "unresolved label",
        long: r#"## LPD-O004: unresolved label

A jump or call names a label that no line defines.
"#,
    },
    ErrorEntry {
        code: "LPD-O005",
        short: "duplicate label",
        long: r#"## LPD-O005: duplicate label

Each label may be defined once.
"#,
    },
    ErrorEntry {
        code: "LPD-O006",
        short: "unknown instruction skipped",
        long: r#"## LPD-O006: unknown instruction skipped

The loader does not know this mnemonic and ignores the line. The
program still runs; `WRITE` is accepted as another name for `PRN`.
"#,
    },

    // ── Runtime ──────────────────────────────────────────────────────────────
    ErrorEntry {
        code: "LPD-R001",
        short: "division by zero",
        long: r#"## LPD-R001: division by zero

`div` was executed with a zero divisor. The machine stops on the `DIVI`
instruction with both operands still on the stack.
"#,
    },
    ErrorEntry {
        code: "LPD-R002",
        short: "stack underflow",
        long: r#"## LPD-R002: stack underflow

An instruction popped from an empty stack. Compiled programs never do
this; hand-written object text can.
"#,
    },
    ErrorEntry {
        code: "LPD-R003",
        short: "stack overflow",
        long: r#"## LPD-R003: stack overflow

The stack reached the end of the 65536-cell memory, typically through
unbounded recursion.
"#,
    },
    ErrorEntry {
        code: "LPD-R004",
        short: "address out of range",
        long: r#"## LPD-R004: address out of range

A load, store or allocation touched a cell outside memory.
"#,
    },
    ErrorEntry {
        code: "LPD-R005",
        short: "jump to an unresolved label",
        long: r#"## LPD-R005: jump to an unresolved label

A jump target was never resolved to a position. Programs loaded through
the normal path are linked first, so this indicates a program built by
hand and run without linking.
"#,
    },
    ErrorEntry {
        code: "LPD-R006",
        short: "invalid return address",
        long: r#"## LPD-R006: invalid return address

`RETURN` or `RETURNF` popped a value that is not a position in the
program. The stack was unbalanced at the time of the return.
"#,
    },
    ErrorEntry {
        code: "LPD-R007",
        short: "input exhausted",
        long: r#"## LPD-R007: input exhausted

`leia` ran after standard input was closed.
"#,
    },
];

/// Look up an error entry by code (e.g. `"LPD-S004"`).
pub fn lookup(code: &str) -> Option<&'static ErrorEntry> {
    REGISTRY.iter().find(|e| e.code == code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_known_code() {
        let e = lookup("LPD-S004").expect("LPD-S004 should be in registry");
        assert_eq!(e.code, "LPD-S004");
        assert_eq!(e.short, "type mismatch");
        assert!(e.long.contains("LPD-S004"));
    }

    #[test]
    fn lookup_unknown_returns_none() {
        assert!(lookup("LPD-XXXX").is_none());
        assert!(lookup("").is_none());
    }

    #[test]
    fn all_codes_unique() {
        let mut codes: Vec<&str> = REGISTRY.iter().map(|e| e.code).collect();
        codes.sort_unstable();
        let len_before = codes.len();
        codes.dedup();
        assert_eq!(codes.len(), len_before, "duplicate codes in registry");
    }

    #[test]
    fn long_text_starts_with_its_code() {
        for entry in REGISTRY {
            assert!(!entry.short.is_empty(), "{} missing short description", entry.code);
            assert!(entry.long.starts_with(&format!("## {}:", entry.code)), "{} heading mismatch", entry.code);
        }
    }
}
