//! 随机令牌博弈：在一般发生规则下随机选择可发生迁移，直到死锁或步数耗尽。
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use serde::Serialize;

use crate::net::{Marking, Net, TransitionId};

#[derive(Debug, Clone, Serialize)]
pub struct SimulationRun {
    pub fired: Vec<TransitionId>,
    pub marking: Marking,
    pub deadlocked: bool,
}

/// Plays at most `steps` random firings; the same `seed` replays the same run.
pub fn simulate(net: &Net, steps: usize, seed: u64) -> SimulationRun {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut marking = net.initial_marking();
    let mut fired = Vec::new();
    let mut deadlocked = false;

    for _ in 0..steps {
        let enabled = net.enabled_transitions(&marking);
        let Some(&transition) = enabled.choose(&mut rng) else {
            deadlocked = true;
            break;
        };
        match net.fire_transition(&marking, transition) {
            Ok(next) => {
                marking = next;
                fired.push(transition);
            }
            Err(err) => {
                log::warn!("simulation stopped: {err}");
                break;
            }
        }
    }
    if !deadlocked && net.enabled_transitions(&marking).is_empty() {
        deadlocked = true;
    }

    log::debug!(
        "net '{}': simulation fired {} transitions, deadlocked: {}",
        net.name,
        fired.len(),
        deadlocked
    );
    SimulationRun {
        fired,
        marking,
        deadlocked,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{Place, Transition};

    fn choice_net() -> Net {
        let mut net = Net::named("choice");
        let start = net.add_place(Place::new("start", 1));
        let left = net.add_place(Place::new("left", 0));
        let right = net.add_place(Place::new("right", 0));
        let go_left = net.add_transition(Transition::new("go_left"));
        let go_right = net.add_transition(Transition::new("go_right"));
        net.add_input_arc(start, go_left, 1);
        net.add_output_arc(left, go_left, 1);
        net.add_input_arc(start, go_right, 1);
        net.add_output_arc(right, go_right, 1);
        net
    }

    #[test]
    fn run_ends_in_deadlock() {
        let net = choice_net();
        let run = simulate(&net, 10, 7);
        assert!(run.deadlocked);
        assert_eq!(run.fired.len(), 1);
        assert_eq!(run.marking.total_tokens(), 1);
    }

    #[test]
    fn same_seed_replays() {
        let net = choice_net();
        let first = simulate(&net, 10, 42);
        let second = simulate(&net, 10, 42);
        assert_eq!(first.fired, second.fired);
        assert_eq!(first.marking, second.marking);
    }

    #[test]
    fn zero_steps_keeps_initial_marking() {
        let net = choice_net();
        let run = simulate(&net, 0, 1);
        assert!(run.fired.is_empty());
        assert!(!run.deadlocked);
        assert_eq!(run.marking, net.initial_marking());
    }
}
