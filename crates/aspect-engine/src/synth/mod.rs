//! Type synthesis
//!
//! Validation, the shared type cache, call packet types and proxy types.

pub mod cache;
pub mod packet;
pub mod proxy_type;
pub mod validate;

pub use cache::{SynthesisLock, TypeCache};
pub use packet::{CallPacket, PacketKey, PacketSynthesizer, PacketType, ReturnPlan};
pub use proxy_type::{ForwardingMember, ProxyMode, ProxySynthesizer, ProxyType};
pub use validate::{check_contract, check_implementation, validate, Contract, Validation};
