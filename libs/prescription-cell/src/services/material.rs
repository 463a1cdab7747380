// libs/prescription-cell/src/services/material.rs

/// One-line description of the lens order, e.g.
/// `Progresivo + Policarbonato + Antirreflejante + Antiblue`.
///
/// Lens types come first, then treatments, then the antiblue filter and the
/// tint. Blank parts are skipped; nothing selected gives an empty string.
pub fn derive_material_summary(
    lens_types: &[String],
    treatments: &[String],
    antiblue: bool,
    tint: bool,
    tint_tone: Option<&str>,
) -> String {
    let mut parts: Vec<String> = lens_types
        .iter()
        .chain(treatments)
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect();

    if antiblue {
        parts.push("Antiblue".to_string());
    }

    if tint {
        let tone = tint_tone.map(str::trim).unwrap_or_default();
        parts.push(format!("Tinte {}", tone).trim_end().to_string());
    }

    parts.join(" + ")
}
