pub mod freecurrency;

pub use freecurrency::FreeCurrencyApiSource;
