//! Unit conversion utilities
//!
//! The remote API is queried in imperial units; everything stored is metric
//! with single-decimal precision. Every conversion takes an `Option` so a
//! missing reading stays missing instead of turning into a zero.

/// Kilometres per hour in one mile per hour
pub const KMH_PER_MPH: f64 = 1.60934;

/// Millimetres in one inch
pub const MM_PER_INCH: f64 = 25.4;

/// Hectopascals in one inch of mercury
pub const HPA_PER_INHG: f64 = 33.8639;

/// Unit group for an imperial reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitGroup {
    /// °F -> °C
    Temperature,
    /// mph -> km/h
    Speed,
    /// in -> mm
    Precipitation,
    /// inHg -> hPa
    Pressure,
}

impl UnitGroup {
    /// Convert an imperial value to metric without rounding
    pub fn to_metric(self, value: f64) -> f64 {
        match self {
            UnitGroup::Temperature => (value - 32.0) * 5.0 / 9.0,
            UnitGroup::Speed => value * KMH_PER_MPH,
            UnitGroup::Precipitation => value * MM_PER_INCH,
            UnitGroup::Pressure => value * HPA_PER_INHG,
        }
    }

    /// Convert a metric value back to imperial without rounding
    pub fn to_imperial(self, value: f64) -> f64 {
        match self {
            UnitGroup::Temperature => value * 9.0 / 5.0 + 32.0,
            UnitGroup::Speed => value / KMH_PER_MPH,
            UnitGroup::Precipitation => value / MM_PER_INCH,
            UnitGroup::Pressure => value / HPA_PER_INHG,
        }
    }
}

/// Round to one decimal place
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Convert an optional imperial reading to metric, rounded to one decimal
pub fn convert(value: Option<f64>, group: UnitGroup) -> Option<f64> {
    value.map(|v| round1(group.to_metric(v)))
}

pub fn fahrenheit_to_celsius(value: Option<f64>) -> Option<f64> {
    convert(value, UnitGroup::Temperature)
}

pub fn mph_to_kmh(value: Option<f64>) -> Option<f64> {
    convert(value, UnitGroup::Speed)
}

pub fn inches_to_mm(value: Option<f64>) -> Option<f64> {
    convert(value, UnitGroup::Precipitation)
}

pub fn inhg_to_hpa(value: Option<f64>) -> Option<f64> {
    convert(value, UnitGroup::Pressure)
}
