//! Printable labels for the key ids the keyboard reports.
//!
//! Ids follow the HID usage table for the keys present on the reference
//! board's analog layout. Used for monitor/detect output and log lines only;
//! the mapping pass works on raw ids.

const KEY_LABELS: &[(u8, &str)] = &[
    (4, "A"),
    (5, "B"),
    (6, "C"),
    (7, "D"),
    (8, "E"),
    (9, "F"),
    (10, "G"),
    (11, "H"),
    (12, "I"),
    (13, "J"),
    (14, "K"),
    (15, "L"),
    (16, "M"),
    (17, "N"),
    (18, "O"),
    (19, "P"),
    (20, "Q"),
    (21, "R"),
    (22, "S"),
    (23, "T"),
    (24, "U"),
    (25, "V"),
    (26, "W"),
    (27, "X"),
    (28, "Y"),
    (29, "Z"),
    (44, "Space"),
    (224, "Ctrl"),
    (225, "Shift"),
];

pub fn key_label(key_id: u8) -> Option<&'static str> {
    KEY_LABELS
        .iter()
        .find(|(id, _)| *id == key_id)
        .map(|(_, label)| *label)
}

/// Label for display, falling back to the hex id for keys outside the
/// known layout.
pub fn key_display(key_id: u8) -> String {
    match key_label(key_id) {
        Some(label) => label.to_string(),
        None => format!("0x{key_id:02X}"),
    }
}
