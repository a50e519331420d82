use crate::models::{ClinicalListInput, Diagnosis};

/// Trimmed, non-empty entries of a clinical list. `None` when nothing is
/// left, so the column is written as null and never as an empty array.
pub fn normalize_list(input: Option<&ClinicalListInput>) -> Option<Vec<String>> {
    let entries: Vec<String> = match input? {
        ClinicalListInput::List(items) => items
            .iter()
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect(),
        ClinicalListInput::Text(text) => text
            .split([',', '\n'])
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect(),
    };

    (!entries.is_empty()).then_some(entries)
}

fn diagnosis_line(diagnosis: &Diagnosis) -> Option<String> {
    let description = diagnosis.description.trim();
    let code = diagnosis.code.as_deref().map(str::trim).filter(|c| !c.is_empty());

    match (code, description.is_empty()) {
        (Some(code), false) => Some(format!("- {} - {}", code, description)),
        (Some(code), true) => Some(format!("- {}", code)),
        (None, false) => Some(format!("- {}", description)),
        (None, true) => None,
    }
}

/// Free-text notes followed by a `Diagnósticos:` block.
pub fn compose_notes(notes: Option<&str>, diagnoses: &[Diagnosis]) -> Option<String> {
    let notes = notes.map(str::trim).filter(|n| !n.is_empty());
    let lines: Vec<String> = diagnoses.iter().filter_map(diagnosis_line).collect();

    match (notes, lines.is_empty()) {
        (None, true) => None,
        (Some(notes), true) => Some(notes.to_string()),
        (None, false) => Some(format!("Diagnósticos:\n{}", lines.join("\n"))),
        (Some(notes), false) => Some(format!("{}\n\nDiagnósticos:\n{}", notes, lines.join("\n"))),
    }
}
