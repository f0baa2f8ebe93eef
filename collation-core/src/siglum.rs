//! Siglum generation for callers that do not name their witnesses

/// Siglum for the witness at `index`: A … Z, AA, AB, … AZ, BA, …
pub fn siglum_for_index(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_siglum_sequence() {
        assert_eq!(siglum_for_index(0), "A");
        assert_eq!(siglum_for_index(2), "C");
        assert_eq!(siglum_for_index(25), "Z");
        assert_eq!(siglum_for_index(26), "AA");
        assert_eq!(siglum_for_index(27), "AB");
        assert_eq!(siglum_for_index(52), "BA");
        assert_eq!(siglum_for_index(701), "ZZ");
        assert_eq!(siglum_for_index(702), "AAA");
    }
}
