//! Form sessions on top of `form_spec`: dependent option lookups with stale
//! response suppression, submission, and the collaborators they talk to.

pub mod error;
pub mod http;
pub mod lookup;
pub mod resolver;
pub mod session;
pub mod sink;
pub mod source;

pub use error::{LookupError, SessionError, SinkError, SourceError};
pub use http::{HttpClient, HttpSettings};
pub use lookup::{LookupRequest, OptionLookup, StaticOptionLookup, parse_options};
pub use resolver::{
    OptionState, ResolutionOutcome, ResolutionTask, dependency_token, resolve_options,
};
pub use session::{FormSession, SessionPhase, SubmitOutcome};
pub use sink::{MemorySink, SubmissionRecord, SubmissionSink, SubmissionTable};
pub use source::{ConfigSource, FileConfigSource, StaticConfigSource, parse_forms};
