//! Conversions between extruded filament length, volume and mass.
//!
//! Lengths are in millimeters, volumes in mm³, masses in grams and densities
//! in g/cm³. Nothing here rounds; that is up to whoever displays the numbers.

use std::f64::consts::PI;

use parse_display::Display;

use crate::inventory::Profile;

/// The filament property a conversion needed to divide by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[display(style = "lowercase")]
pub enum FilamentProperty {
    /// Filament diameter.
    Diameter,

    /// Filament density.
    Density,
}

/// Errors returned by the usage conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum UsageError {
    /// The conversion would divide by a zero diameter or density.
    #[error("division by zero: filament {0} is zero")]
    DivisionByZero(FilamentProperty),
}

/// Volume of a cylinder of filament `length` long.
pub fn length_to_volume(diameter: f64, length: f64) -> f64 {
    length * cross_section(diameter)
}

/// Mass of `volume` mm³ of filament with the given density.
pub fn volume_to_mass(volume: f64, density: f64) -> f64 {
    volume / 1000.0 * density
}

/// Length of filament holding `volume` mm³.
pub fn volume_to_length(diameter: f64, volume: f64) -> Result<f64, UsageError> {
    if diameter == 0.0 {
        return Err(UsageError::DivisionByZero(FilamentProperty::Diameter));
    }
    Ok(volume / cross_section(diameter))
}

/// Volume in mm³ taken up by `mass` grams of filament.
pub fn mass_to_volume(mass: f64, density: f64) -> Result<f64, UsageError> {
    if density == 0.0 {
        return Err(UsageError::DivisionByZero(FilamentProperty::Density));
    }
    Ok(mass / density * 1000.0)
}

/// Mass of `length` mm of the profile's filament.
pub fn length_to_mass(profile: &Profile, length: f64) -> f64 {
    volume_to_mass(length_to_volume(profile.diameter, length), profile.density)
}

/// Length of filament left when `remaining` grams are still on the spool.
pub fn remaining_length(profile: &Profile, remaining: f64) -> Result<f64, UsageError> {
    volume_to_length(profile.diameter, mass_to_volume(remaining, profile.density)?)
}

fn cross_section(diameter: f64) -> f64 {
    let radius = diameter / 2.0;
    PI * radius * radius
}
