//! The regions covered by the simulations and their short display labels.

/// Bucket for cells the source data could not assign to a region.
/// Every warehouse template excludes it.
pub const UNCLASSIFIED_ZONE: &str = "Zona sin demarcar";

/// Official region names (as stored in the warehouse) paired with the short
/// labels shown in charts, ordered north to south.
pub const REGION_LABELS: [(&str, &str); 12] = [
    ("Región de Coquimbo", "Coquimbo"),
    ("Región de Valparaíso", "Valparaíso"),
    ("Región Metropolitana de Santiago", "Metropolitana"),
    ("Región del Libertador Bernardo O'Higgins", "Lib B O'Higgins"),
    ("Región del Maule", "Maule"),
    ("Región de Ñuble", "Ñuble"),
    ("Región del Bío-Bío", "Bío-Bío"),
    ("Región de La Araucanía", "La Araucanía"),
    ("Región de Los Ríos", "Los Ríos"),
    ("Región de Los Lagos", "Los Lagos"),
    ("Región de Aysén del Gral.Ibañez del Campo", "Aysén"),
    ("Región de Magallanes y Antártica Chilena", "Magallanes"),
];

/// Returns the short label for an official region name, or `name` unchanged
/// when it is not one of the twelve known regions.
///
/// ```
/// use calidad_aire::short_region_label;
///
/// assert_eq!(short_region_label("Región del Maule"), "Maule");
/// assert_eq!(short_region_label("Maule"), "Maule");
/// assert_eq!(short_region_label("Santiago"), "Santiago");
/// ```
pub fn short_region_label(name: &str) -> &str {
    REGION_LABELS
        .iter()
        .find(|(long, _)| *long == name)
        .map(|(_, short)| *short)
        .unwrap_or(name)
}

/// Iterates over the official region names in catalogue order.
pub fn region_names() -> impl Iterator<Item = &'static str> {
    REGION_LABELS.iter().map(|(long, _)| *long)
}
