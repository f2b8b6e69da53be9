// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Admission checks run against every transaction before it is buffered.

use crate::config::AgentConfig;
use crate::error::ValidationError;
use crate::transaction::Transaction;

/// A single precondition on a [`Transaction`].
///
/// Validators read the registries of the config snapshot and never mutate
/// anything.
pub trait TransactionValidator: Send + Sync {
    fn validate(&self, tx: &Transaction, config: &AgentConfig) -> Result<(), ValidationError>;
}

/// Both ends of the transaction must be registered applications.
#[derive(Debug, Default, Clone, Copy)]
pub struct ApplicationValidator;

impl TransactionValidator for ApplicationValidator {
    fn validate(&self, tx: &Transaction, config: &AgentConfig) -> Result<(), ValidationError> {
        let from = non_blank(tx.from_key()).ok_or(ValidationError::MissingFrom)?;
        let to = non_blank(tx.to_key()).ok_or(ValidationError::MissingTo)?;

        if !config.applications.contains_key(from) {
            return Err(ValidationError::UnknownFromApplication(from.to_string()));
        }
        if !config.applications.contains_key(to) {
            return Err(ValidationError::UnknownToApplication(to.to_string()));
        }
        Ok(())
    }
}

/// Every id list must be keyed by a registered id type.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdTypeValidator;

impl TransactionValidator for IdTypeValidator {
    fn validate(&self, tx: &Transaction, config: &AgentConfig) -> Result<(), ValidationError> {
        match tx
            .ids()
            .iter()
            .find(|entry| !config.id_types.contains_key(&entry.type_key))
        {
            Some(entry) => Err(ValidationError::UnknownIdType(entry.type_key.clone())),
            None => Ok(()),
        }
    }
}

/// The operation is optional, but when set it must be registered.
#[derive(Debug, Default, Clone, Copy)]
pub struct OperationValidator;

impl TransactionValidator for OperationValidator {
    fn validate(&self, tx: &Transaction, config: &AgentConfig) -> Result<(), ValidationError> {
        match tx.operation_key() {
            Some(key) if !config.operations.contains_key(key) => {
                Err(ValidationError::UnknownOperation(key.to_string()))
            }
            _ => Ok(()),
        }
    }
}

/// Runs validators in a fixed order and stops at the first failure.
pub struct ValidatorChain {
    validators: Vec<Box<dyn TransactionValidator>>,
}

impl Default for ValidatorChain {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidatorChain {
    /// Application, then id type, then operation.
    pub fn new() -> Self {
        Self {
            validators: vec![
                Box::new(ApplicationValidator),
                Box::new(IdTypeValidator),
                Box::new(OperationValidator),
            ],
        }
    }

    pub fn validate(&self, tx: &Transaction, config: &AgentConfig) -> Result<(), ValidationError> {
        self.validators
            .iter()
            .try_for_each(|validator| validator.validate(tx, config))
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
