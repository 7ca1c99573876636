//! In-order comparison of expected and observed packets.
//!
//! Each interface owns a FIFO of expected packets. Every actual packet pops
//! the oldest expected one; differences are recorded, not raised, so a run
//! reports all of them at [`Scoreboard::finalize`].

use futures::StreamExt;
use futures_channel::mpsc;
use log::{info, warn};
use num_format::{Locale, ToFormattedString};
use prettytable::{Cell, Row, Table};
use std::collections::VecDeque;
use std::fmt;

use crate::error::ScoreboardError;
use crate::executor::JoinHandle;
use crate::packet::Packet;
use crate::shared::Shared;
use crate::sim::Sim;

#[derive(Debug, Clone, PartialEq)]
pub enum MismatchKind {
    Length { expected: usize, actual: usize },
    /// Element types differ at `position`, e.g. int against float or two fixed point formats.
    Type { position: usize },
    Value { position: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mismatch {
    pub interface: String,
    /// Index of the packet on its interface, counting from 0.
    pub index: usize,
    pub expected: Packet,
    pub actual: Packet,
    pub kind: MismatchKind,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} packet #{}: ", self.interface, self.index)?;
        match self.kind {
            MismatchKind::Length { expected, actual } => {
                write!(f, "expected {} words, got {}", expected, actual)
            }
            MismatchKind::Type { position } => write!(
                f,
                "word {} is {}, expected {}",
                position,
                self.actual[position].type_name(),
                self.expected[position].type_name()
            ),
            MismatchKind::Value { position } => write!(
                f,
                "word {} is {}, expected {}",
                position, self.actual[position], self.expected[position]
            ),
        }
    }
}

/// First point where `actual` diverges from `expected`, if any.
pub fn compare(expected: &Packet, actual: &Packet) -> Option<MismatchKind> {
    for (position, (e, a)) in expected.iter().zip(actual.iter()).enumerate() {
        if !e.same_type(a) {
            return Some(MismatchKind::Type { position });
        }
        if e != a {
            return Some(MismatchKind::Value { position });
        }
    }
    if expected.len() != actual.len() {
        return Some(MismatchKind::Length {
            expected: expected.len(),
            actual: actual.len(),
        });
    }
    None
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceSummary {
    pub name: String,
    pub expected: usize,
    pub received: usize,
    pub matched: usize,
    /// Expected packets never received.
    pub outstanding: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreboardSummary {
    pub interfaces: Vec<InterfaceSummary>,
}

impl ScoreboardSummary {
    pub fn table(&self) -> Table {
        let mut table = Table::new();
        table.set_titles(Row::new(
            ["interface", "expected", "received", "matched", "outstanding"]
                .iter()
                .map(|t| Cell::new(t))
                .collect(),
        ));
        for i in &self.interfaces {
            table.add_row(Row::new(vec![
                Cell::new(&i.name),
                Cell::new(&i.expected.to_formatted_string(&Locale::en)),
                Cell::new(&i.received.to_formatted_string(&Locale::en)),
                Cell::new(&i.matched.to_formatted_string(&Locale::en)),
                Cell::new(&i.outstanding.to_formatted_string(&Locale::en)),
            ]));
        }
        table
    }
}

impl fmt::Display for ScoreboardSummary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.table())
    }
}

/// Everything that went wrong in a run, as returned by [`Scoreboard::finalize`].
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreboardFailure {
    pub summary: ScoreboardSummary,
    pub mismatches: Vec<Mismatch>,
    pub underflows: Vec<ScoreboardError>,
    /// (interface, number of expected packets left over)
    pub leftovers: Vec<(String, usize)>,
}

impl fmt::Display for ScoreboardFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            f,
            "scoreboard failed: {} mismatches, {} unexpected packets, {} interfaces with missing packets",
            self.mismatches.len(),
            self.underflows.len(),
            self.leftovers.len()
        )?;
        for m in &self.mismatches {
            writeln!(f, "  {}", m)?;
        }
        for u in &self.underflows {
            writeln!(f, "  {}", u)?;
        }
        for (name, n) in &self.leftovers {
            writeln!(f, "  {}: {} expected packets were never received", name, n)?;
        }
        write!(f, "{}", self.summary)
    }
}

impl std::error::Error for ScoreboardFailure {}

struct Interface {
    name: String,
    expected: VecDeque<Packet>,
    n_expected: usize,
    received: usize,
    matched: usize,
}

#[derive(Default)]
struct ScoreboardInner {
    interfaces: Vec<Interface>,
    mismatches: Vec<Mismatch>,
    underflows: Vec<ScoreboardError>,
}

impl ScoreboardInner {
    fn interface(&mut self, name: &str) -> Result<&mut Interface, ScoreboardError> {
        self.interfaces
            .iter_mut()
            .find(|i| i.name == name)
            .ok_or_else(|| ScoreboardError::UnknownInterface(name.to_string()))
    }
}

#[derive(Clone, Default)]
pub struct Scoreboard(Shared<ScoreboardInner>);

impl Scoreboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_interface(&self, name: &str) -> Result<(), ScoreboardError> {
        let mut inner = self.0.get_mut();
        if inner.interfaces.iter().any(|i| i.name == name) {
            return Err(ScoreboardError::DuplicateInterface(name.to_string()));
        }
        inner.interfaces.push(Interface {
            name: name.to_string(),
            expected: VecDeque::new(),
            n_expected: 0,
            received: 0,
            matched: 0,
        });
        Ok(())
    }

    /// Queues the next packet `name` is expected to produce.
    pub fn expect(&self, name: &str, packet: Packet) -> Result<(), ScoreboardError> {
        let mut inner = self.0.get_mut();
        let interface = inner.interface(name)?;
        interface.expected.push_back(packet);
        interface.n_expected += 1;
        Ok(())
    }

    /// Compares `packet` against the oldest expected packet of `name`.
    ///
    /// Mismatches are recorded and reported by [`Scoreboard::finalize`]. An
    /// underflow is recorded as well and also returned.
    pub fn on_actual(&self, name: &str, packet: Packet) -> Result<(), ScoreboardError> {
        let mut inner = self.0.get_mut();
        let interface = inner.interface(name)?;
        let index = interface.received;
        interface.received += 1;

        let expected = match interface.expected.pop_front() {
            Some(expected) => expected,
            None => {
                let err = ScoreboardError::Underflow {
                    interface: name.to_string(),
                    index,
                };
                warn!("{}", err);
                inner.underflows.push(err.clone());
                return Err(err);
            }
        };

        match compare(&expected, &packet) {
            None => interface.matched += 1,
            Some(kind) => {
                let mismatch = Mismatch {
                    interface: name.to_string(),
                    index,
                    expected,
                    actual: packet,
                    kind,
                };
                warn!("mismatch: {}", mismatch);
                inner.mismatches.push(mismatch);
            }
        }
        Ok(())
    }

    /// Feeds every packet from `rx` into [`Scoreboard::on_actual`] until the
    /// channel closes. Any error other than an underflow ends the run.
    pub fn attach(&self, sim: &Sim, name: &str, mut rx: mpsc::Receiver<Packet>) -> JoinHandle<()> {
        let sb = self.clone();
        let name = name.to_string();
        sim.fork(&format!("scoreboard {}", name), async move {
            while let Some(packet) = rx.next().await {
                match sb.on_actual(&name, packet) {
                    // logged by on_actual and reported again at finalize
                    Ok(()) | Err(ScoreboardError::Underflow { .. }) => {}
                    Err(e) => return Err(e.into()),
                }
            }
            Ok(())
        })
    }

    /// Expected packets of `name` still waiting for their actual counterpart.
    pub fn pending(&self, name: &str) -> Result<usize, ScoreboardError> {
        let mut inner = self.0.get_mut();
        Ok(inner.interface(name)?.expected.len())
    }

    pub fn summary(&self) -> ScoreboardSummary {
        let inner = self.0.get();
        ScoreboardSummary {
            interfaces: inner
                .interfaces
                .iter()
                .map(|i| InterfaceSummary {
                    name: i.name.clone(),
                    expected: i.n_expected,
                    received: i.received,
                    matched: i.matched,
                    outstanding: i.expected.len(),
                })
                .collect(),
        }
    }

    /// Passes if every expected packet was received and matched and nothing
    /// unexpected arrived.
    pub fn finalize(&self) -> Result<ScoreboardSummary, ScoreboardFailure> {
        let summary = self.summary();
        let inner = self.0.get();
        let leftovers: Vec<(String, usize)> = summary
            .interfaces
            .iter()
            .filter(|i| i.outstanding > 0)
            .map(|i| (i.name.clone(), i.outstanding))
            .collect();

        if inner.mismatches.is_empty() && inner.underflows.is_empty() && leftovers.is_empty() {
            info!("scoreboard passed\n{}", summary);
            return Ok(summary);
        }
        Err(ScoreboardFailure {
            summary,
            mismatches: inner.mismatches.clone(),
            underflows: inner.underflows.clone(),
            leftovers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Value;
    use crate::error::TbError;
    use rstest::rstest;

    fn board() -> Scoreboard {
        let sb = Scoreboard::new();
        sb.register_interface("m_axis").unwrap();
        sb
    }

    #[test]
    fn in_order_packets_pass() {
        let sb = board();
        let a = Packet::ints([1, 2, 3]);
        let b = Packet::ints([4, 5]);
        sb.expect("m_axis", a.clone()).unwrap();
        sb.expect("m_axis", b.clone()).unwrap();
        sb.on_actual("m_axis", a).unwrap();
        sb.on_actual("m_axis", b).unwrap();
        let summary = sb.finalize().unwrap();
        assert_eq!(
            summary.interfaces,
            vec![InterfaceSummary {
                name: "m_axis".to_string(),
                expected: 2,
                received: 2,
                matched: 2,
                outstanding: 0,
            }]
        );
    }

    #[test]
    fn swapped_packets_give_one_mismatch_each() {
        let sb = board();
        let a = Packet::ints([1, 2, 3]);
        let b = Packet::ints([1, 2, 4]);
        sb.expect("m_axis", a.clone()).unwrap();
        sb.expect("m_axis", b.clone()).unwrap();
        sb.on_actual("m_axis", b).unwrap();
        sb.on_actual("m_axis", a).unwrap();
        let failure = sb.finalize().unwrap_err();
        assert_eq!(failure.mismatches.len(), 2);
        assert_eq!(failure.mismatches[0].index, 0);
        assert_eq!(failure.mismatches[1].index, 1);
        assert!(failure
            .mismatches
            .iter()
            .all(|m| m.kind == MismatchKind::Value { position: 2 }));
        assert!(failure.to_string().contains("m_axis packet #1: word 2 is 3, expected 4"));
    }

    #[rstest]
    #[case(Packet::ints([1, 2]), Packet::ints([1, 2, 3]), Some(MismatchKind::Length { expected: 2, actual: 3 }))]
    #[case(Packet::ints([1, 2]), Packet::floats([1.0, 2.0]), Some(MismatchKind::Type { position: 0 }))]
    #[case(Packet::ints([1, 2]), Packet::ints([1, 5]), Some(MismatchKind::Value { position: 1 }))]
    #[case(Packet::floats([0.5]), Packet::floats([0.5]), None)]
    fn compare_reports_first_divergence(
        #[case] expected: Packet,
        #[case] actual: Packet,
        #[case] kind: Option<MismatchKind>,
    ) {
        assert_eq!(compare(&expected, &actual), kind);
    }

    #[test]
    fn underflow_is_reported() {
        let sb = board();
        let err = sb.on_actual("m_axis", Packet::ints([1])).unwrap_err();
        assert_eq!(
            err,
            ScoreboardError::Underflow {
                interface: "m_axis".to_string(),
                index: 0
            }
        );
        let failure = sb.finalize().unwrap_err();
        assert_eq!(failure.underflows, vec![err]);
        assert!(failure.mismatches.is_empty());
    }

    #[test]
    fn leftover_expectations_fail() {
        let sb = board();
        sb.expect("m_axis", Packet::ints([1])).unwrap();
        sb.expect("m_axis", Packet::ints([2])).unwrap();
        sb.on_actual("m_axis", Packet::ints([1])).unwrap();
        assert_eq!(sb.pending("m_axis").unwrap(), 1);
        let failure = sb.finalize().unwrap_err();
        assert_eq!(failure.leftovers, vec![("m_axis".to_string(), 1)]);
    }

    #[test]
    fn interfaces_are_independent() {
        let sb = board();
        sb.register_interface("n_axis").unwrap();
        assert_eq!(
            sb.register_interface("n_axis"),
            Err(ScoreboardError::DuplicateInterface("n_axis".to_string()))
        );
        sb.expect("m_axis", Packet::ints([1])).unwrap();
        sb.expect("n_axis", Packet::ints([2])).unwrap();
        sb.on_actual("n_axis", Packet::ints([2])).unwrap();
        sb.on_actual("m_axis", Packet::ints([1])).unwrap();
        assert!(sb.finalize().is_ok());
        assert!(matches!(
            sb.expect("x_axis", Packet::new()),
            Err(ScoreboardError::UnknownInterface(_))
        ));
    }

    #[test]
    fn summary_renders_as_table() {
        let sb = board();
        sb.expect("m_axis", Packet::ints([1])).unwrap();
        sb.on_actual("m_axis", Packet::ints([2])).unwrap();
        sb.on_actual("m_axis", Packet::ints([3])).unwrap_err();
        let table = sb.summary().to_string();
        assert!(table.contains("outstanding"));
        assert!(table.contains("m_axis"));

        let failure = sb.finalize().unwrap_err();
        let report = failure.to_string();
        assert!(report.starts_with("scoreboard failed: 1 mismatches, 1 unexpected packets"));
        assert!(report.contains("m_axis packet #0: word 0 is 2, expected 1"));
        assert!(report.contains("m_axis: received packet #1 but nothing was expected"));
        assert!(report.contains("received"));
    }

    #[test]
    fn attach_to_unknown_interface_fails_run() {
        let sim = Sim::new();
        let sb = board();
        let (mut tx, rx) = mpsc::channel(2);
        sb.attach(&sim, "m_axsi", rx);
        let tb = sim.clone();
        let result = sim.run(10, async move {
            futures::SinkExt::send(&mut tx, Packet::ints([1, 2, 3])).await.unwrap();
            for _ in 0..3 {
                tb.rising_edge().await;
            }
            Ok(())
        });
        assert!(matches!(
            result,
            Err(TbError::Scoreboard(ScoreboardError::UnknownInterface(name))) if name == "m_axsi"
        ));
    }

    #[test]
    fn attached_underflow_does_not_end_run() {
        let sim = Sim::new();
        let sb = board();
        let (mut tx, rx) = mpsc::channel(2);
        sb.attach(&sim, "m_axis", rx);
        let tb = sim.clone();
        sim.run(10, async move {
            futures::SinkExt::send(&mut tx, Packet::ints([1])).await.unwrap();
            tb.rising_edge().await;
            Ok(())
        })
        .unwrap();
        assert_eq!(sb.finalize().unwrap_err().underflows.len(), 1);
    }

    #[test]
    fn attached_channel_feeds_comparisons() {
        let sim = Sim::new();
        let sb = board();
        let (mut tx, rx) = mpsc::channel(2);
        sb.attach(&sim, "m_axis", rx);
        sb.expect("m_axis", Packet::from(vec![Value::Int(3)])).unwrap();
        let tb = sim.clone();
        sim.run(10, async move {
            futures::SinkExt::send(&mut tx, Packet::ints([3])).await.unwrap();
            tb.rising_edge().await;
            Ok(())
        })
        .unwrap();
        assert_eq!(sb.summary().interfaces[0].matched, 1);
        assert!(sb.finalize().is_ok());
    }
}
