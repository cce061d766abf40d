//! Payment types shared by the router, the connectors and the gateway

use crate::validation::{validate_currency_code, validate_positive_amount};
use crate::{Error, Result, CORRIDOR_SEPARATOR};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

// =========================================================================
// CORRIDOR
// =========================================================================

/// Geographic path of a payment, written `"NG->EU"`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Corridor {
    /// Origin country (or region) code
    pub origin: String,
    /// Destination country (or region) code
    pub destination: String,
}

impl Corridor {
    /// Create a corridor from its two codes
    pub fn new(origin: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            origin: origin.into().to_ascii_uppercase(),
            destination: destination.into().to_ascii_uppercase(),
        }
    }
}

impl fmt::Display for Corridor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.origin, CORRIDOR_SEPARATOR, self.destination)
    }
}

impl FromStr for Corridor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (origin, destination) = s
            .split_once(CORRIDOR_SEPARATOR)
            .ok_or_else(|| Error::InvalidCorridor(s.to_string()))?;

        let origin = origin.trim();
        let destination = destination.trim();
        let is_code = |code: &str| code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic());

        if !is_code(origin) || !is_code(destination) {
            return Err(Error::InvalidCorridor(s.to_string()));
        }

        Ok(Self::new(origin, destination))
    }
}

impl TryFrom<String> for Corridor {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Corridor> for String {
    fn from(corridor: Corridor) -> Self {
        corridor.to_string()
    }
}

// =========================================================================
// PAYMENT REQUEST
// =========================================================================

/// Beneficiary of a payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Beneficiary {
    /// Beneficiary name
    pub name: String,
    /// Account identifier (IBAN, wallet MSISDN, ...)
    pub account: String,
    /// Bank or operator code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_code: Option<String>,
    /// Country code (ISO 3166-1 alpha-2)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

/// One logical payment attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    /// Identifies the logical payment across retries
    #[serde(default = "generate_idempotency_key")]
    #[validate(length(min = 1, max = 128))]
    pub idempotency_key: String,
    /// Amount in major units, scaled to the currency
    #[validate(custom(function = "validate_positive_amount"))]
    pub amount: Decimal,
    /// ISO 4217 currency code
    #[validate(custom(function = "validate_currency_code"))]
    pub currency: String,
    /// Debited account
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_account: Option<String>,
    /// Credited account
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_account: Option<String>,
    /// Beneficiary details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beneficiary: Option<Beneficiary>,
    /// Origin -> destination pair
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corridor: Option<Corridor>,
    /// Free-form caller metadata
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Generate a fresh idempotency key (UUID v4)
pub fn generate_idempotency_key() -> String {
    Uuid::new_v4().to_string()
}

impl PaymentRequest {
    /// Create a request with a generated idempotency key
    pub fn new(amount: Decimal, currency: impl Into<String>) -> Self {
        Self {
            idempotency_key: generate_idempotency_key(),
            amount,
            currency: currency.into(),
            source_account: None,
            destination_account: None,
            beneficiary: None,
            corridor: None,
            metadata: HashMap::new(),
        }
    }

    /// Replace the idempotency key
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = key.into();
        self
    }

    /// Set the corridor
    pub fn with_corridor(mut self, corridor: Corridor) -> Self {
        self.corridor = Some(corridor);
        self
    }

    /// Set the beneficiary
    pub fn with_beneficiary(mut self, beneficiary: Beneficiary) -> Self {
        self.beneficiary = Some(beneficiary);
        self
    }

    /// Set the credited account
    pub fn with_destination_account(mut self, account: impl Into<String>) -> Self {
        self.destination_account = Some(account.into());
        self
    }

    /// Check amount, currency and key invariants
    pub fn ensure_valid(&self) -> Result<()> {
        self.validate().map_err(Error::from)
    }

    /// Account that will be credited, from the beneficiary or the request
    pub fn credited_account(&self) -> Option<&str> {
        self.beneficiary
            .as_ref()
            .map(|b| b.account.as_str())
            .filter(|account| !account.trim().is_empty())
            .or(self.destination_account.as_deref())
            .filter(|account| !account.trim().is_empty())
    }
}

// =========================================================================
// PAYMENT RESPONSE
// =========================================================================

/// Payment lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentState {
    /// Accepted by the rail
    Accepted,
    /// In flight on the rail
    Processing,
    /// Settled
    Completed,
    /// Rejected or failed
    Failed,
}

impl PaymentState {
    /// Anything except `Failed`
    pub fn is_success(&self) -> bool {
        !matches!(self, PaymentState::Failed)
    }
}

impl fmt::Display for PaymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentState::Accepted => write!(f, "accepted"),
            PaymentState::Processing => write!(f, "processing"),
            PaymentState::Completed => write!(f, "completed"),
            PaymentState::Failed => write!(f, "failed"),
        }
    }
}

/// Result of one routing attempt. Never mutated once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    /// Outcome
    pub status: PaymentState,
    /// Rail-scoped reference embedding the idempotency key
    pub reference: String,
    /// Connector that produced the response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Human readable message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl PaymentResponse {
    /// Failed response carrying a reason
    pub fn failed(reference: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: PaymentState::Failed,
            reference: reference.into(),
            provider: None,
            message: Some(message.into()),
        }
    }

    /// Accepted response from a provider
    pub fn accepted(reference: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            status: PaymentState::Accepted,
            reference: reference.into(),
            provider: Some(provider.into()),
            message: None,
        }
    }

    /// Attach a provider name
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Attach a message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// True when the status is not `failed`
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Outcome of a refund request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundResponse {
    /// Original payment reference
    pub reference: String,
    /// Reference of the refund on the rail
    pub refund_reference: String,
    /// Refund state
    pub status: PaymentState,
    /// Refunded amount (full refund when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    /// Human readable message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
