/// Votes of one kind needed to decide among `members` peers: ceil(2N/3).
///
/// Strictly more than half for every N >= 1, and tolerates up to
/// floor((N - 1) / 3) Byzantine members.
pub fn quorum_for(members: usize) -> usize {
    (2 * members).div_ceil(3)
}

/// Largest number of faulty members the quorum tolerates
pub fn max_faulty(members: usize) -> usize {
    members.saturating_sub(1) / 3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quorum_values() {
        assert_eq!(quorum_for(1), 1);
        assert_eq!(quorum_for(2), 2);
        assert_eq!(quorum_for(3), 2);
        assert_eq!(quorum_for(4), 3);
        assert_eq!(quorum_for(6), 4);
        assert_eq!(quorum_for(7), 5);
    }

    #[test]
    fn test_quorum_is_a_majority() {
        for n in 1..=64 {
            assert!(2 * quorum_for(n) > n, "n = {n}");
            assert!(quorum_for(n) <= n);
        }
    }

    #[test]
    fn test_max_faulty() {
        assert_eq!(max_faulty(1), 0);
        assert_eq!(max_faulty(4), 1);
        assert_eq!(max_faulty(7), 2);
    }
}
