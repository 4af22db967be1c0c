//! Remote backend for the project repository.
//!
//! ## Endpoints
//!
//! | Method | Path | Purpose |
//! |---|---|---|
//! | GET | `/health` | initialization probe |
//! | GET | `/api/projects` | list as `{ "projects": [...] }` |
//! | GET | `/api/projects/{id}` | fetch one, 404 when absent |
//! | POST | `/api/projects` | create |
//! | PUT | `/api/projects/{id}` | full update |
//! | DELETE | `/api/projects/{id}` | delete |
//! | POST | `/api/storage/save` | whole-state save |
//! | GET | `/api/storage/load` | whole-state load |

mod connectivity;
mod queue;
mod repository;
mod transport;

pub use connectivity::{ConnectivityMonitor, ConnectivityWatcher};
pub use queue::{OperationKind, PendingOperation, PendingQueue};
pub use repository::{
    ErrorCallback, NetworkConfig, NetworkRepository, DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_DELAY,
    DEFAULT_TIMEOUT,
};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Transport};
