use serde::{Deserialize, Serialize};

/// Whether repayment must wait for the issuer to confirm the buyer's payment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepaymentPolicy {
    /// Payment confirmation and repayment are independent
    #[default]
    Unordered,
    /// `repay_loan` fails until the invoice is marked paid
    RequireConfirmedPayment,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub repayment_policy: RepaymentPolicy,
}

impl LedgerConfig {
    pub fn with_repayment_policy(mut self, policy: RepaymentPolicy) -> Self {
        self.repayment_policy = policy;
        self
    }
}
