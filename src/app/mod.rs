// Application layer: end-to-end drivers composed from core components and adapters.

pub mod pipelines;
