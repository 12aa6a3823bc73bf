use std::collections::HashMap;

use crate::domain::{FinancingRequest, Invoice, InvoiceId, LedgerError};

/// Authoritative in-memory collections of invoices and financing requests.
///
/// Records are kept in insertion order and indexed by invoice id. Updates are
/// whole-record replacements, so a record is never observed half-written.
#[derive(Debug, Clone, Default)]
pub struct LedgerStore {
    invoices: Vec<Invoice>,
    invoice_index: HashMap<InvoiceId, usize>,
    requests: Vec<FinancingRequest>,
    request_index: HashMap<InvoiceId, usize>,
}

impl LedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================
    // Invoice operations
    // ========================

    /// Insert a new invoice. Identifiers are never reused.
    pub fn insert_invoice(&mut self, invoice: Invoice) -> Result<(), LedgerError> {
        if self.invoice_index.contains_key(&invoice.invoice_id) {
            return Err(LedgerError::DuplicateKey(invoice.invoice_id));
        }

        self.invoice_index
            .insert(invoice.invoice_id.clone(), self.invoices.len());
        self.invoices.push(invoice);
        Ok(())
    }

    pub fn get_invoice(&self, invoice_id: &InvoiceId) -> Result<&Invoice, LedgerError> {
        self.invoice_index
            .get(invoice_id)
            .map(|&idx| &self.invoices[idx])
            .ok_or_else(|| LedgerError::invoice_not_found(invoice_id))
    }

    pub fn contains_invoice(&self, invoice_id: &InvoiceId) -> bool {
        self.invoice_index.contains_key(invoice_id)
    }

    /// Replace every field of an existing invoice.
    pub fn replace_invoice(&mut self, invoice: Invoice) -> Result<(), LedgerError> {
        let idx = *self
            .invoice_index
            .get(&invoice.invoice_id)
            .ok_or_else(|| LedgerError::invoice_not_found(&invoice.invoice_id))?;
        self.invoices[idx] = invoice;
        Ok(())
    }

    /// Snapshot of all invoices in insertion order.
    pub fn list_invoices(&self) -> Vec<Invoice> {
        self.invoices.clone()
    }

    pub fn invoices(&self) -> &[Invoice] {
        &self.invoices
    }

    // ========================
    // Financing request operations
    // ========================

    /// Insert a financing request. Its invoice must already exist.
    pub fn insert_financing_request(&mut self, request: FinancingRequest) -> Result<(), LedgerError> {
        if !self.contains_invoice(&request.invoice_id) {
            return Err(LedgerError::invoice_not_found(&request.invoice_id));
        }
        if self.request_index.contains_key(&request.invoice_id) {
            return Err(LedgerError::DuplicateKey(request.invoice_id));
        }

        self.request_index
            .insert(request.invoice_id.clone(), self.requests.len());
        self.requests.push(request);
        Ok(())
    }

    pub fn get_financing_request(
        &self,
        invoice_id: &InvoiceId,
    ) -> Result<&FinancingRequest, LedgerError> {
        self.request_index
            .get(invoice_id)
            .map(|&idx| &self.requests[idx])
            .ok_or_else(|| LedgerError::request_not_found(invoice_id))
    }

    pub fn contains_financing_request(&self, invoice_id: &InvoiceId) -> bool {
        self.request_index.contains_key(invoice_id)
    }

    /// Replace every field of an existing financing request.
    pub fn replace_financing_request(
        &mut self,
        request: FinancingRequest,
    ) -> Result<(), LedgerError> {
        let idx = *self
            .request_index
            .get(&request.invoice_id)
            .ok_or_else(|| LedgerError::request_not_found(&request.invoice_id))?;
        self.requests[idx] = request;
        Ok(())
    }

    /// Snapshot of all financing requests in insertion order.
    pub fn list_financing_requests(&self) -> Vec<FinancingRequest> {
        self.requests.clone()
    }

    pub fn financing_requests(&self) -> &[FinancingRequest] {
        &self.requests
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::domain::Principal;

    fn invoice(id: &str, amount: u64) -> Invoice {
        let now = Utc::now();
        Invoice::new(
            id.into(),
            Principal::new("seller"),
            amount,
            now + Duration::days(30),
            now,
        )
    }

    #[test]
    fn test_insert_and_get_invoice() {
        let mut store = LedgerStore::new();
        store.insert_invoice(invoice("INV1", 1000)).unwrap();

        let fetched = store.get_invoice(&"INV1".into()).unwrap();
        assert_eq!(fetched.amount, 1000);
        assert!(store.contains_invoice(&"INV1".into()));
        assert_eq!(store.invoices().len(), 1);
    }

    #[test]
    fn test_duplicate_invoice_keeps_original() {
        let mut store = LedgerStore::new();
        store.insert_invoice(invoice("INV1", 1000)).unwrap();

        let err = store.insert_invoice(invoice("INV1", 5)).unwrap_err();

        assert_eq!(err, LedgerError::DuplicateKey("INV1".into()));
        assert_eq!(store.get_invoice(&"INV1".into()).unwrap().amount, 1000);
        assert_eq!(store.invoices().len(), 1);
    }

    #[test]
    fn test_missing_records_are_not_found() {
        let store = LedgerStore::new();

        assert!(matches!(
            store.get_invoice(&"NOPE".into()),
            Err(LedgerError::NotFound(_))
        ));
        assert!(matches!(
            store.get_financing_request(&"NOPE".into()),
            Err(LedgerError::NotFound(_))
        ));
    }

    #[test]
    fn test_request_requires_existing_invoice() {
        let mut store = LedgerStore::new();
        let request = FinancingRequest::new("GHOST".into(), 10, Utc::now());

        assert!(matches!(
            store.insert_financing_request(request),
            Err(LedgerError::NotFound(_))
        ));
        assert_eq!(store.financing_requests().len(), 0);
    }

    #[test]
    fn test_duplicate_request_rejected() {
        let mut store = LedgerStore::new();
        store.insert_invoice(invoice("INV1", 1000)).unwrap();
        store
            .insert_financing_request(FinancingRequest::new("INV1".into(), 600, Utc::now()))
            .unwrap();

        let err = store
            .insert_financing_request(FinancingRequest::new("INV1".into(), 100, Utc::now()))
            .unwrap_err();

        assert_eq!(err, LedgerError::DuplicateKey("INV1".into()));
        assert_eq!(
            store
                .get_financing_request(&"INV1".into())
                .unwrap()
                .requested_amount,
            600
        );
    }

    #[test]
    fn test_replace_is_total() {
        let mut store = LedgerStore::new();
        let original = invoice("INV1", 1000);
        store.insert_invoice(original.clone()).unwrap();

        let paid = original.mark_paid(Utc::now());
        store.replace_invoice(paid.clone()).unwrap();

        assert_eq!(store.get_invoice(&"INV1".into()).unwrap(), &paid);
        assert!(matches!(
            store.replace_invoice(invoice("OTHER", 1)),
            Err(LedgerError::NotFound(_))
        ));
    }

    #[test]
    fn test_listing_preserves_insertion_order() {
        let mut store = LedgerStore::new();
        for id in ["C", "A", "B"] {
            store.insert_invoice(invoice(id, 100)).unwrap();
        }
        store
            .replace_invoice(invoice("A", 100).mark_paid(Utc::now()))
            .unwrap();

        let ids: Vec<String> = store
            .list_invoices()
            .iter()
            .map(|i| i.invoice_id.to_string())
            .collect();
        assert_eq!(ids, vec!["C", "A", "B"]);
    }
}
