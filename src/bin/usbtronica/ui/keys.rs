//! Piano strip for the keyboard octave plus a readout of every sounding note

use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

/// Key label and note for each playable key, in pitch order
const STRIP: [(&str, u8); 13] = [
    ("Q", 60),
    ("2", 61),
    ("W", 62),
    ("3", 63),
    ("E", 64),
    ("R", 65),
    ("5", 66),
    ("T", 67),
    ("6", 68),
    ("Y", 69),
    ("7", 70),
    ("U", 71),
    ("I", 72),
];

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Scientific pitch name, e.g. 60 -> "C4"
pub fn note_name(note: u8) -> String {
    let octave = note as i32 / 12 - 1;
    format!("{}{}", NOTE_NAMES[note as usize % 12], octave)
}

fn is_black(note: u8) -> bool {
    matches!(note % 12, 1 | 3 | 6 | 8 | 10)
}

pub fn render_keys(frame: &mut Frame, area: Rect, active_notes: &[u8]) {
    let block = Block::default().title(" Keys ").borders(Borders::ALL);

    let keys: Vec<Span> = STRIP
        .iter()
        .map(|&(label, note)| {
            let base = if is_black(note) {
                Style::default().fg(Color::White).bg(Color::DarkGray)
            } else {
                Style::default().fg(Color::Black).bg(Color::Gray)
            };
            let style = if active_notes.contains(&note) {
                base.bg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                base
            };
            Span::styled(format!(" {label} "), style)
        })
        .collect();

    let sounding = if active_notes.is_empty() {
        "-".to_string()
    } else {
        active_notes
            .iter()
            .map(|&n| note_name(n))
            .collect::<Vec<_>>()
            .join(" ")
    };

    let lines = vec![
        Line::from(keys),
        Line::from(""),
        Line::from(vec![
            Span::styled("Sounding: ", Style::default().fg(Color::DarkGray)),
            Span::styled(sounding, Style::default().fg(Color::Green)),
        ]),
    ];

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_notes() {
        assert_eq!(note_name(60), "C4");
        assert_eq!(note_name(61), "C#4");
        assert_eq!(note_name(72), "C5");
        assert_eq!(note_name(21), "A0");
    }

    #[test]
    fn strip_matches_keyboard_table() {
        for (label, note) in STRIP {
            let code = if label.chars().all(|c| c.is_ascii_digit()) {
                format!("Digit{label}")
            } else {
                format!("Key{label}")
            };
            assert_eq!(usbtronica::control::keyboard::note_for_key(&code), Some(note));
        }
    }
}
