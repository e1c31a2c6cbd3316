//! Scripted [`ChainProvider`] for unit tests.
//!
//! Each operation pops its next response from a queue. The last queued response is sticky,
//! so `vec![Ok(None), Ok(Some(receipt))]` means "not mined on the first poll, mined from then on".

use alloy::primitives::{address, b256, Address, Bytes, Log, B256};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::provider::{ChainProvider, ProviderError};
use crate::types::{ReadCall, TransactionDetails, TransactionIntent, TxReceipt};

pub(crate) const TX_HASH: B256 =
    b256!("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");

pub(crate) const CIRCLE: Address = address!("0xabababababababababababababababababababab");

pub(crate) fn intent(correlation_id: &str) -> TransactionIntent {
    TransactionIntent::new(CIRCLE, "contribute", vec![0xde, 0xad, 0xbe, 0xef], correlation_id)
}

pub(crate) fn receipt(block_number: u64, status: bool, gas_used: u64, logs: Vec<Log>) -> TxReceipt {
    TxReceipt {
        transaction_hash: TX_HASH,
        block_number,
        status,
        gas_used,
        logs,
    }
}

struct Script<T>(Mutex<VecDeque<T>>);

impl<T> Default for Script<T> {
    fn default() -> Self {
        Self(Mutex::new(VecDeque::new()))
    }
}

impl<T: Clone> Script<T> {
    fn new(items: Vec<T>) -> Self {
        Self(Mutex::new(items.into()))
    }

    fn next(&self) -> Option<T> {
        let mut queue = self.0.lock().unwrap();
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[derive(Default)]
pub(crate) struct MockProvider {
    estimates: Script<Result<u64, ProviderError>>,
    sends: Script<Result<B256, ProviderError>>,
    receipts: Script<Result<Option<TxReceipt>, ProviderError>>,
    block_numbers: Script<Result<u64, ProviderError>>,
    calls: Script<Result<Bytes, ProviderError>>,
    transactions: Mutex<HashMap<B256, TransactionDetails>>,
    sent_gas_limits: Mutex<Vec<u64>>,
    estimate_calls: AtomicUsize,
    send_calls: AtomicUsize,
    receipt_calls: AtomicUsize,
    block_calls: AtomicUsize,
    read_calls: AtomicUsize,
}

impl MockProvider {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_estimates(mut self, items: Vec<Result<u64, ProviderError>>) -> Self {
        self.estimates = Script::new(items);
        self
    }

    pub(crate) fn with_sends(mut self, items: Vec<Result<B256, ProviderError>>) -> Self {
        self.sends = Script::new(items);
        self
    }

    pub(crate) fn with_receipts(
        mut self,
        items: Vec<Result<Option<TxReceipt>, ProviderError>>,
    ) -> Self {
        self.receipts = Script::new(items);
        self
    }

    pub(crate) fn with_block_numbers(mut self, items: Vec<Result<u64, ProviderError>>) -> Self {
        self.block_numbers = Script::new(items);
        self
    }

    pub(crate) fn with_calls(mut self, items: Vec<Result<Bytes, ProviderError>>) -> Self {
        self.calls = Script::new(items);
        self
    }

    pub(crate) fn with_transaction(self, details: TransactionDetails) -> Self {
        self.transactions
            .lock()
            .unwrap()
            .insert(details.hash, details);
        self
    }

    pub(crate) fn sent_gas_limits(&self) -> Vec<u64> {
        self.sent_gas_limits.lock().unwrap().clone()
    }

    pub(crate) fn estimate_calls(&self) -> usize {
        self.estimate_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn send_calls(&self) -> usize {
        self.send_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn receipt_calls(&self) -> usize {
        self.receipt_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn block_calls(&self) -> usize {
        self.block_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn read_calls(&self) -> usize {
        self.read_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainProvider for MockProvider {
    async fn estimate_gas(&self, _intent: &TransactionIntent) -> Result<u64, ProviderError> {
        self.estimate_calls.fetch_add(1, Ordering::SeqCst);
        self.estimates.next().unwrap_or(Ok(21_000))
    }

    async fn send_transaction(
        &self,
        _intent: &TransactionIntent,
        gas_limit: u64,
    ) -> Result<B256, ProviderError> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        self.sent_gas_limits.lock().unwrap().push(gas_limit);
        self.sends.next().unwrap_or(Ok(TX_HASH))
    }

    async fn get_transaction_receipt(
        &self,
        _hash: B256,
    ) -> Result<Option<TxReceipt>, ProviderError> {
        self.receipt_calls.fetch_add(1, Ordering::SeqCst);
        self.receipts.next().unwrap_or(Ok(None))
    }

    async fn get_block_number(&self) -> Result<u64, ProviderError> {
        self.block_calls.fetch_add(1, Ordering::SeqCst);
        self.block_numbers.next().unwrap_or(Ok(0))
    }

    async fn get_transaction(
        &self,
        hash: B256,
    ) -> Result<Option<TransactionDetails>, ProviderError> {
        Ok(self.transactions.lock().unwrap().get(&hash).cloned())
    }

    async fn call(&self, _read: &ReadCall) -> Result<Bytes, ProviderError> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        self.calls
            .next()
            .unwrap_or_else(|| Err(ProviderError::Other("no scripted read".into())))
    }
}
