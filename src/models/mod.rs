pub mod access;
pub mod deposition;
pub mod draft;
pub mod loaders;
pub mod recjson;
pub mod sip;

pub use access::AccessRight;
pub use deposition::{Deposition, DepositionFile, DepositionState, WorkflowState, WorkflowStatus};
pub use draft::{Draft, FieldValue};
pub use loaders::{load_all_requests, load_deposition_request, DepositionRequest, RequestUser};
pub use recjson::RecJson;
pub use sip::Sip;
