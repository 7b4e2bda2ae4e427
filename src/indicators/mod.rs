// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of the indicators the bundled
// strategies need. Every public function is a plain `Vec<f64>` transform so
// callers stay in control of windowing and NaN/insufficient-data handling.

pub mod rsi;
