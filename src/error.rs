//! Error types for mutation testing

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while generating, scheduling or executing mutants
#[derive(Debug, Error)]
pub enum MutationError {
    /// An instruction carries an operand of the wrong shape for its opcode
    #[error("Invalid instruction {opcode}: {reason}")]
    InvalidInstruction { opcode: String, reason: String },

    /// A method descriptor could not be parsed
    #[error("Invalid method descriptor '{descriptor}': {reason}")]
    InvalidDescriptor { descriptor: String, reason: String },

    /// An operator produced a structurally invalid replacement
    #[error("Operator {operator} produced an invalid substitution in {method}: {reason}")]
    InvalidSubstitution {
        operator: String,
        method: String,
        reason: String,
    },

    /// The requested mutation does not exist in the class
    #[error("Mutation {id} not found")]
    MutationNotFound { id: String },

    /// The class could not be located
    #[error("Class not found: {class}")]
    ClassNotFound { class: String },

    /// The analyser failed to produce results for a group
    #[error("Analysis failed: {reason}")]
    Analysis { reason: String },

    /// The isolated environment could not be launched or used
    #[error("Isolated environment error: {reason}")]
    Environment { reason: String },

    /// A result history file could not be read or written
    #[error("History error for '{}': {reason}", file.display())]
    History { file: PathBuf, reason: String },

    /// Failed to read an input file
    #[error("Failed to read file '{}': {error}", file.display())]
    FileReadError { file: PathBuf, error: String },

    /// Failed to write an output file
    #[error("Failed to write file '{}': {error}", file.display())]
    WriteError { file: PathBuf, error: String },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError { message: String },
}

/// Result type for mutation operations
pub type Result<T> = std::result::Result<T, MutationError>;
