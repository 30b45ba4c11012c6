pub mod ambisonics;
pub mod latency;
pub mod ring_buffer;
