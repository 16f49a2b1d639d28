//! Musical timing: host transport reconciliation, trigger quantization, and
//! the quantized playhead speed-ratio table.

pub mod quantize;
pub mod speed;
pub mod transport;

pub use quantize::{QuantizationClock, QuantizedTrigger};
pub use transport::{HostPosition, Transport};
