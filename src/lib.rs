//! Compiler and stack virtual machine for LPD, a small Pascal-like teaching
//! language with Portuguese keywords.
//!
//! The pipeline is [`lexer`] → [`grammar`] → [`ast::builder`] (with the
//! [`symbols`] table) → [`optimize`] → [`codegen`] → [`vm`]. [`compiler::compile`]
//! runs all of it; [`vm::StackMachine`] executes the result.

pub mod ast;
pub mod codegen;
pub mod compiler;
pub mod diagnostic;
pub mod grammar;
pub mod lexer;
pub mod optimize;
pub mod symbols;
pub mod vm;
