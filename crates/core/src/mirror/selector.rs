use rand::seq::SliceRandom;
use rand::Rng;

use super::MirrorListError;

/// Pick one mirror uniformly at random.
pub fn choose_mirror<S: AsRef<str>>(mirrors: &[S]) -> Result<&str, MirrorListError> {
    choose_mirror_with(mirrors, &mut rand::thread_rng())
}

/// Pick one mirror uniformly at random using the given generator.
pub fn choose_mirror_with<'a, S, R>(mirrors: &'a [S], rng: &mut R) -> Result<&'a str, MirrorListError>
where
    S: AsRef<str>,
    R: Rng + ?Sized,
{
    mirrors
        .choose(rng)
        .map(|mirror| mirror.as_ref())
        .ok_or(MirrorListError::Empty)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn test_choose_from_empty_fails() {
        let mirrors: Vec<String> = Vec::new();
        assert_eq!(choose_mirror(&mirrors).unwrap_err(), MirrorListError::Empty);
    }

    #[test]
    fn test_choose_single() {
        assert_eq!(choose_mirror(&["http://only"]).unwrap(), "http://only");
    }

    #[test]
    fn test_choose_is_uniform() {
        let mirrors = ["http://a", "http://b", "http://c", "http://d"];
        let mut rng = StdRng::seed_from_u64(0x6d65_6469_6174_6865);
        let mut counts: HashMap<&str, u32> = HashMap::new();

        let draws = 10_000;
        for _ in 0..draws {
            *counts.entry(choose_mirror_with(&mirrors, &mut rng).unwrap()).or_default() += 1;
        }

        assert_eq!(counts.len(), 4);
        for (mirror, count) in counts {
            let share = count as f64 / draws as f64;
            assert!(
                (0.22..=0.28).contains(&share),
                "{} chosen with share {:.3}",
                mirror,
                share
            );
        }
    }
}
