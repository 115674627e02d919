//! Output structure check
//!
//! Every answer must carry the five section headers. A missing header never
//! blocks delivery or persistence; it only appends a visible warning.

/// Section headers every answer must contain
pub const REQUIRED_SECTIONS: [&str; 5] = [
    "THE ATOMIC DECONSTRUCTION",
    "WEAK ASSUMPTIONS",
    "THE HIGH-LEVERAGE TWEAK",
    "LOGICAL DERIVATION",
    "THE CONTRARIAN VIEW",
];

/// Check `text` for the required headers, case-insensitively and in any order.
///
/// Returns the text with a warning appended when sections are missing,
/// together with the missing names in their canonical order.
pub fn validate_structure(text: &str) -> (String, Vec<&'static str>) {
    let upper = text.to_uppercase();
    let missing: Vec<&'static str> = REQUIRED_SECTIONS
        .iter()
        .copied()
        .filter(|section| !upper.contains(section))
        .collect();

    if missing.is_empty() {
        return (text.to_string(), missing);
    }

    tracing::warn!("Answer is missing sections: {}", missing.join(", "));

    let warning = format!(
        "\n\n---\n> **⚠ Structure warning:** missing section(s): {}",
        missing.join(", ")
    );
    (format!("{}{}", text, warning), missing)
}
