use rand::Rng;

use crate::repositories;

// No 0/O/1/I: codes get read out loud and typed from projector slides.
const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_LEN: usize = 8;
const MAX_GENERATION_ATTEMPTS: usize = 10;

pub(crate) fn generate_share_code() -> String {
    let mut rng = rand::thread_rng();
    let mut code = String::with_capacity(CODE_LEN);
    for _ in 0..CODE_LEN {
        let index = rng.gen_range(0..ALPHABET.len());
        code.push(ALPHABET[index] as char);
    }
    code
}

/// Draws codes until one is free. The space is 32^8, so a handful of
/// attempts is always enough in practice; the unique index on
/// quizzes.share_code backstops the race between check and insert.
pub(crate) async fn unique_share_code(pool: &sqlx::PgPool) -> Result<String, sqlx::Error> {
    for attempt in 1..=MAX_GENERATION_ATTEMPTS {
        let code = generate_share_code();
        if !repositories::quizzes::share_code_exists(pool, &code).await? {
            return Ok(code);
        }
        tracing::warn!(attempt, "Share code collision, retrying");
    }
    // Give the caller the last candidate and let the unique constraint decide.
    Ok(generate_share_code())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn share_code_has_expected_shape() {
        let code = generate_share_code();
        assert_eq!(code.len(), CODE_LEN);
        assert!(code.bytes().all(|b| ALPHABET.contains(&b)));
    }

    #[test]
    fn share_codes_avoid_ambiguous_characters() {
        for _ in 0..100 {
            let code = generate_share_code();
            assert!(!code.contains('0'));
            assert!(!code.contains('O'));
            assert!(!code.contains('1'));
            assert!(!code.contains('I'));
        }
    }
}
