//! Pitch arithmetic in 12-tone equal temperament.
//!
//! Pitches are integer semitones in MIDI numbering: C-1 is 0, middle C
//! (C4) is 60 and A4 is 69.

/// MIDI note number of A4, the tuning reference.
pub const REFERENCE_NOTE: i32 = 69;

/// Frequency of [`REFERENCE_NOTE`] in Hz.
pub const CONCERT_PITCH: f64 = 440.0;

/// Frequency ratios for 0-11 semitones: `SEMITONE_RATIO[n] = 2^(n/12)`.
const SEMITONE_RATIO: [f64; 12] = [
    1.0,
    1.0594630943592953,
    1.122462048309373,
    1.189207115002721,
    1.2599210498948732,
    1.3348398541700344,
    1.4142135623730951,
    1.4983070768766815,
    1.5874010519681994,
    1.681792830507429,
    1.7817974362806785,
    1.8877486253633868,
];

/// Semitone offset of a note letter from C within one octave.
pub fn key_offset(letter: char) -> Option<i32> {
    match letter.to_ascii_lowercase() {
        'c' => Some(0),
        'd' => Some(2),
        'e' => Some(4),
        'f' => Some(5),
        'g' => Some(7),
        'a' => Some(9),
        'b' => Some(11),
        _ => None,
    }
}

/// Absolute semitone of `letter` shifted by `accidental` in `octave`.
///
/// `semitone('c', 0, 4) == 60`. `None` for an unknown letter or a pitch
/// outside the `i32` range.
pub fn semitone(letter: char, accidental: i32, octave: i32) -> Option<i32> {
    let key = key_offset(letter)?.checked_add(accidental)?;
    octave.checked_add(1)?.checked_mul(12)?.checked_add(key)
}

/// Frequency ratio for a shift of `semitones`.
///
/// Whole octaves are applied as exact powers of two, so a shift of 0 is
/// exactly 1.0 and a shift of ±12 exactly 2.0 / 0.5. Shifts past the `f64`
/// exponent range give infinity or zero.
pub fn shift_ratio(semitones: i32) -> f64 {
    let octaves = semitones.div_euclid(12);
    let remainder = semitones.rem_euclid(12) as usize;
    2f64.powi(octaves) * SEMITONE_RATIO[remainder]
}

/// Frequency of a semitone in Hz (A4 = 440 Hz).
pub fn semitone_to_hz(semitone: i32) -> f64 {
    CONCERT_PITCH * shift_ratio(semitone - REFERENCE_NOTE)
}

/// Parse scientific pitch notation (`A4`, `C#5`, `Gb3`, `Bbb-1`).
///
/// Plain integers are accepted as MIDI note numbers.
pub fn parse_spn(text: &str) -> Option<i32> {
    let text = text.trim();
    if let Ok(midi) = text.parse::<i32>() {
        return Some(midi);
    }

    let mut chars = text.chars();
    let letter = chars.next()?;
    let rest = chars.as_str();

    let (accidental, octave) = match rest {
        _ if rest.starts_with("##") => (2, &rest[2..]),
        _ if rest.starts_with("bb") => (-2, &rest[2..]),
        _ if rest.starts_with('#') => (1, &rest[1..]),
        _ if rest.starts_with('b') => (-1, &rest[1..]),
        _ => (0, rest),
    };

    semitone(letter, accidental, octave.parse().ok()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn middle_c_is_sixty() {
        assert_eq!(semitone('c', 0, 4), Some(60));
        assert_eq!(semitone('c', 0, 5), Some(72));
        assert_eq!(semitone('c', 0, -1), Some(0));
    }

    #[test]
    fn letters_progress_diatonically() {
        let steps: Vec<i32> = "cdefgab"
            .chars()
            .map(|c| semitone(c, 0, 4).unwrap() - 60)
            .collect();
        assert_eq!(steps, [0, 2, 4, 5, 7, 9, 11]);
    }

    #[test]
    fn accidentals_shift_by_one() {
        assert_eq!(semitone('f', 1, 4), Some(66));
        assert_eq!(semitone('c', -1, 4), Some(59));
        assert_eq!(semitone('h', 0, 4), None);
    }

    #[test]
    fn out_of_range_octaves_give_none() {
        assert_eq!(semitone('c', 0, 200_000_000), None);
        assert_eq!(semitone('c', 0, i32::MAX), None);
        assert_eq!(semitone('c', 0, i32::MIN), None);
        assert_eq!(semitone('b', 1, 178_956_969), None);
        assert_eq!(semitone('c', 0, 178_956_968), Some(2_147_483_628));
        assert_eq!(parse_spn("C999999999"), None);
    }

    #[test]
    fn extreme_shifts_saturate() {
        assert_eq!(shift_ratio(12 * 2000), f64::INFINITY);
        assert_eq!(shift_ratio(-12 * 2000), 0.0);
        assert_eq!(shift_ratio(i32::MAX), f64::INFINITY);
    }

    #[test]
    fn shift_ratio_octaves_are_exact() {
        assert_eq!(shift_ratio(0), 1.0);
        assert_eq!(shift_ratio(12), 2.0);
        assert_eq!(shift_ratio(24), 4.0);
        assert_eq!(shift_ratio(-12), 0.5);
    }

    #[test]
    fn shift_ratio_matches_equal_temperament() {
        for n in -30..30 {
            let expected = 2f64.powf(n as f64 / 12.0);
            assert!((shift_ratio(n) - expected).abs() < 1e-9, "semitones {}", n);
        }
    }

    #[test]
    fn a4_is_concert_pitch() {
        assert_eq!(semitone_to_hz(69), 440.0);
        assert_eq!(semitone_to_hz(57), 220.0);
        assert!((semitone_to_hz(60) - 261.6256).abs() < 1e-3);
    }

    #[test]
    fn parse_spn_forms() {
        assert_eq!(parse_spn("A4"), Some(69));
        assert_eq!(parse_spn("C#5"), Some(73));
        assert_eq!(parse_spn("Gb3"), Some(54));
        assert_eq!(parse_spn("c-1"), Some(0));
        assert_eq!(parse_spn("Bbb2"), Some(45));
        assert_eq!(parse_spn("60"), Some(60));
        assert_eq!(parse_spn("H2"), None);
        assert_eq!(parse_spn("C"), None);
    }
}
