//! Error types and result alias for the crate.
//!
//! This module defines [`enum@crate::error::Error`] and the crate-wide [Result] alias.
//! Variants cover invalid run settings, missing or out-of-bound parameters, missing
//! collaborators and data members, dispersal kernel consistency failures, IO, and
//! generic errors.
//!
//! Every error is fatal: setup aborts before the first timestep runs.
use thiserror::Error;

use crate::population::{LifeStage, SpeciesId};

pub type Result<T> = std::result::Result<T, Error>;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{behavior}: missing required parameter '{tag}'")]
    DataMissing { behavior: String, tag: String },

    #[error("{behavior}: bad value for '{tag}': {message}")]
    BadData {
        behavior: String,
        tag: String,
        message: String,
    },

    #[error("{behavior}: data member '{label}' is not registered for species {species} ({stage})")]
    MissingDataMember {
        behavior: String,
        label: String,
        species: SpeciesId,
        stage: LifeStage,
    },

    #[error("{behavior}: required collaborator '{name}' not found")]
    MissingCollaborator { behavior: String, name: String },

    #[error("dispersal kernel for species {species}: {message}")]
    Kernel { species: SpeciesId, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub(crate) fn bad_data(
        behavior: impl Into<String>,
        tag: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::BadData {
            behavior: behavior.into(),
            tag: tag.into(),
            message: message.into(),
        }
    }

    pub(crate) fn data_missing(behavior: impl Into<String>, tag: impl Into<String>) -> Self {
        Error::DataMissing {
            behavior: behavior.into(),
            tag: tag.into(),
        }
    }
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        Error::Other(value)
    }
}

impl From<&str> for Error {
    fn from(value: &str) -> Self {
        Error::Other(value.to_owned())
    }
}
