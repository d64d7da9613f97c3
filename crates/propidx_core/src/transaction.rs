//! Transaction context consumed by transactional population.
//!
//! Population can run on behalf of a user transaction. The populator only
//! reads from that transaction: who is running it, under which security
//! context, and whether it has been terminated. Commit is refused once a
//! termination reason is present.

use crate::types::TransactionId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// Kind of the enclosing transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionType {
    /// Opened by the engine for a single statement.
    Implicit,
    /// Opened and closed by the client.
    Explicit,
}

/// Access granted to a security context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AccessMode {
    /// Reads only.
    Read,
    /// Reads and data writes.
    Write,
    /// Reads, writes and schema operations.
    Full,
}

/// The identity and access under which work runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityContext {
    subject: String,
    mode: AccessMode,
}

impl SecurityContext {
    /// Creates a security context.
    pub fn new(subject: impl Into<String>, mode: AccessMode) -> Self {
        Self {
            subject: subject.into(),
            mode,
        }
    }

    /// Full access for internal work such as index population.
    #[must_use]
    pub fn auth_disabled() -> Self {
        Self::new("AUTH_DISABLED", AccessMode::Full)
    }

    /// Returns the subject name.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Returns the access mode.
    #[must_use]
    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Returns true if schema operations are allowed.
    #[must_use]
    pub fn allows_schema(&self) -> bool {
        self.mode == AccessMode::Full
    }
}

/// Connection metadata of the client that opened the transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConnectionInfo {
    /// Protocol the client connected with (`embedded` for in-process use).
    pub protocol: String,
    /// Remote address, when there is one.
    pub client_address: Option<String>,
    /// Connection identifier.
    pub connection_id: Option<String>,
}

impl ClientConnectionInfo {
    /// Connection info for in-process callers.
    #[must_use]
    pub fn embedded() -> Self {
        Self {
            protocol: "embedded".into(),
            client_address: None,
            connection_id: None,
        }
    }
}

/// A status code with description, used as a termination reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    code: String,
    description: String,
}

impl Status {
    /// Creates a status.
    pub fn new(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            description: description.into(),
        }
    }

    /// The transaction was terminated by an administrator or the client.
    #[must_use]
    pub fn terminated() -> Self {
        Self::new(
            "Transaction.Terminated",
            "explicitly terminated by the user",
        )
    }

    /// The transaction ran past its time limit.
    #[must_use]
    pub fn timed_out() -> Self {
        Self::new(
            "Transaction.TransactionTimedOut",
            "terminated after exceeding its timeout",
        )
    }

    /// Returns the status code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Returns the description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.description)
    }
}

/// The underlying kernel transaction.
pub trait KernelTransaction: Send + Sync + fmt::Debug {
    /// Returns the transaction ID.
    fn id(&self) -> TransactionId;

    /// Returns true while the transaction is open.
    fn is_open(&self) -> bool;
}

/// A temporary security override. Dropping it (or calling
/// [`SecurityOverride::revert`]) restores the previous context.
#[must_use = "the override is reverted as soon as it is dropped"]
pub struct SecurityOverride<'a> {
    revert: Option<Box<dyn FnOnce() + 'a>>,
}

impl<'a> SecurityOverride<'a> {
    /// Creates an override that runs `revert` when it ends.
    pub fn new(revert: impl FnOnce() + 'a) -> Self {
        Self {
            revert: Some(Box::new(revert)),
        }
    }

    /// Ends the override now.
    pub fn revert(mut self) {
        if let Some(revert) = self.revert.take() {
            revert();
        }
    }
}

impl Drop for SecurityOverride<'_> {
    fn drop(&mut self) {
        if let Some(revert) = self.revert.take() {
            revert();
        }
    }
}

impl fmt::Debug for SecurityOverride<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityOverride")
            .field("active", &self.revert.is_some())
            .finish()
    }
}

/// Ambient transaction information for transactional population.
pub trait TransactionContext: Send + Sync {
    /// Escape hatch to the raw kernel transaction.
    ///
    /// Kept narrow so uses of the underlying handle stay easy to find.
    fn kernel_transaction_loophole(&self) -> &dyn KernelTransaction;

    /// Returns the transaction type.
    fn transaction_type(&self) -> TransactionType;

    /// Returns the current security context.
    fn security_context(&self) -> SecurityContext;

    /// Returns client connection metadata.
    fn client_info(&self) -> ClientConnectionInfo;

    /// Runs under `context` until the returned override ends.
    fn override_with(&self, context: SecurityContext) -> SecurityOverride<'_>;

    /// Returns why the transaction was terminated, if it was.
    fn termination_reason(&self) -> Option<Status>;

    /// Replaces the transaction metadata.
    fn set_meta_data(&self, meta: HashMap<String, serde_json::Value>);
}

#[derive(Debug)]
struct SimpleKernelTransaction {
    id: TransactionId,
    open: AtomicBool,
}

impl KernelTransaction for SimpleKernelTransaction {
    fn id(&self) -> TransactionId {
        self.id
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

/// A self-contained [`TransactionContext`] for embedded callers and tests.
///
/// Thread-safe: another thread may call [`SimpleTransaction::terminate`]
/// while population runs.
#[derive(Debug)]
pub struct SimpleTransaction {
    kernel: SimpleKernelTransaction,
    transaction_type: TransactionType,
    security: RwLock<SecurityContext>,
    client: ClientConnectionInfo,
    termination: RwLock<Option<Status>>,
    meta: RwLock<HashMap<String, serde_json::Value>>,
}

impl SimpleTransaction {
    /// Creates an open transaction.
    #[must_use]
    pub fn new(id: TransactionId, transaction_type: TransactionType, security: SecurityContext) -> Self {
        Self {
            kernel: SimpleKernelTransaction {
                id,
                open: AtomicBool::new(true),
            },
            transaction_type,
            security: RwLock::new(security),
            client: ClientConnectionInfo::embedded(),
            termination: RwLock::new(None),
            meta: RwLock::new(HashMap::new()),
        }
    }

    /// Sets the client connection info.
    #[must_use]
    pub fn with_client(mut self, client: ClientConnectionInfo) -> Self {
        self.client = client;
        self
    }

    /// Terminates the transaction with `reason`. The first reason wins.
    pub fn terminate(&self, reason: Status) {
        let mut termination = self.termination.write();
        if termination.is_none() {
            *termination = Some(reason);
        }
        self.kernel.open.store(false, Ordering::Release);
    }

    /// Returns a copy of the current metadata.
    #[must_use]
    pub fn meta_data(&self) -> HashMap<String, serde_json::Value> {
        self.meta.read().clone()
    }
}

impl TransactionContext for SimpleTransaction {
    fn kernel_transaction_loophole(&self) -> &dyn KernelTransaction {
        &self.kernel
    }

    fn transaction_type(&self) -> TransactionType {
        self.transaction_type
    }

    fn security_context(&self) -> SecurityContext {
        self.security.read().clone()
    }

    fn client_info(&self) -> ClientConnectionInfo {
        self.client.clone()
    }

    fn override_with(&self, context: SecurityContext) -> SecurityOverride<'_> {
        let previous = std::mem::replace(&mut *self.security.write(), context);
        SecurityOverride::new(move || *self.security.write() = previous)
    }

    fn termination_reason(&self) -> Option<Status> {
        self.termination.read().clone()
    }

    fn set_meta_data(&self, meta: HashMap<String, serde_json::Value>) {
        *self.meta.write() = meta;
    }
}
