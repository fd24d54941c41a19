//! Round-robin turn scheduling.

/// Returns the index of the participant who speaks after `turn_count` turns.
///
/// Index 0 always opens and every participant speaks once before anyone speaks
/// twice. `agent_count` must be non-zero; start validation guarantees at least two.
pub fn next_speaker(turn_count: usize, agent_count: usize) -> usize {
    turn_count % agent_count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_agent_opens() {
        for agent_count in 2..=4 {
            assert_eq!(next_speaker(0, agent_count), 0);
        }
    }

    #[test]
    fn test_matches_modulo() {
        for agent_count in 2..=4 {
            for turn_count in 0..64 {
                assert_eq!(next_speaker(turn_count, agent_count), turn_count % agent_count);
            }
        }
    }

    #[test]
    fn test_every_prefix_is_balanced() {
        for agent_count in 2..=4 {
            for max_turns in 1..=25 {
                let mut counts = vec![0usize; agent_count];
                for turn_count in 0..max_turns {
                    counts[next_speaker(turn_count, agent_count)] += 1;
                }
                let floor = max_turns / agent_count;
                for (idx, count) in counts.iter().enumerate() {
                    assert!(
                        *count == floor || *count == floor + 1,
                        "agent {idx} spoke {count} times in {max_turns} turns with {agent_count} agents"
                    );
                }
            }
        }
    }

    #[test]
    fn test_two_agents_alternate() {
        let order: Vec<usize> = (0..4).map(|t| next_speaker(t, 2)).collect();
        assert_eq!(order, vec![0, 1, 0, 1]);
    }
}
