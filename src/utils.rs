use crate::sim::Sim;

/// Waits for `n_cycles` rising edges.
pub async fn clock_cycles(sim: &Sim, n_cycles: u64) {
    for _ in 0..n_cycles {
        sim.rising_edge().await;
    }
}
