use tracing::trace;

use crate::data::grid::same_time;
use crate::data::Event;
use crate::simulator::integrator::Integrator;

/// A discrete change to the system at a point in time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    /// Add an amount to a compartment.
    AddAmount { input: usize, amount: f64 },
    /// Change the zero-order input rate into a compartment.
    RateChange { input: usize, delta: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledAction {
    pub time: f64,
    pub action: Action,
}

/// Ordered queue of the actions of one run.
///
/// Actions are stable-sorted by time, so simultaneous events keep the order in
/// which they were declared. An infusion contributes two actions: the rate is
/// switched on at its start and off at its end.
#[derive(Debug, Clone)]
pub struct EventScheduler {
    actions: Vec<ScheduledAction>,
    next: usize,
}

impl EventScheduler {
    /// Build the queue from events listed in declaration order.
    pub fn new(events: &[Event]) -> Self {
        let mut actions = Vec::with_capacity(events.len() * 2);
        for event in events {
            match event {
                Event::Bolus(bolus) => actions.push(ScheduledAction {
                    time: bolus.time(),
                    action: Action::AddAmount {
                        input: bolus.input(),
                        amount: bolus.amount(),
                    },
                }),
                Event::Infusion(infusion) => {
                    actions.push(ScheduledAction {
                        time: infusion.time(),
                        action: Action::RateChange {
                            input: infusion.input(),
                            delta: infusion.rate(),
                        },
                    });
                    actions.push(ScheduledAction {
                        time: infusion.end(),
                        action: Action::RateChange {
                            input: infusion.input(),
                            delta: -infusion.rate(),
                        },
                    });
                }
            }
        }
        // sort_by is stable
        actions.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { actions, next: 0 }
    }

    pub fn actions(&self) -> &[ScheduledAction] {
        &self.actions
    }

    /// Times at which the integrator has to stop, in ascending order.
    pub fn times(&self) -> impl Iterator<Item = f64> + '_ {
        self.actions.iter().map(|a| a.time)
    }

    pub fn next_time(&self) -> Option<f64> {
        self.actions.get(self.next).map(|a| a.time)
    }

    pub fn is_exhausted(&self) -> bool {
        self.next >= self.actions.len()
    }

    /// Apply every pending action due at or before `t`.
    ///
    /// Boluses go into the integrator state, rate changes into `rates`.
    /// Returns the number of actions applied.
    pub fn apply_due(&mut self, t: f64, integrator: &mut Integrator, rates: &mut [f64]) -> usize {
        let mut applied = 0;
        while let Some(scheduled) = self.actions.get(self.next) {
            if scheduled.time > t && !same_time(scheduled.time, t) {
                break;
            }
            match scheduled.action {
                Action::AddAmount { input, amount } => {
                    integrator.apply_bolus(input, amount);
                }
                Action::RateChange { input, delta } => {
                    let rate = rates[input] + delta;
                    // switching off the last infusion leaves rounding noise behind
                    rates[input] = if rate.abs() <= 1e-12 * delta.abs() {
                        0.0
                    } else {
                        rate
                    };
                    integrator.invalidate();
                }
            }
            trace!(t, action = ?scheduled.action, "event applied");
            self.next += 1;
            applied += 1;
        }
        applied
    }
}

/// A point the integrator must land on exactly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StopTime {
    pub time: f64,
    /// A row is recorded at this time.
    pub report: bool,
}

/// Merge report times and event times into one ascending sequence.
///
/// Times that coincide keep the report time's value.
pub fn stop_times(report_times: &[f64], event_times: impl IntoIterator<Item = f64>) -> Vec<StopTime> {
    let mut stops: Vec<StopTime> = report_times
        .iter()
        .map(|&time| StopTime { time, report: true })
        .chain(
            event_times
                .into_iter()
                .map(|time| StopTime { time, report: false }),
        )
        .collect();
    // reports first among equal times, so dedup keeps them
    stops.sort_by(|a, b| a.time.total_cmp(&b.time).then(b.report.cmp(&a.report)));
    stops.dedup_by(|later, kept| {
        if same_time(later.time, kept.time) {
            kept.report |= later.report;
            true
        } else {
            false
        }
    });
    stops
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Bolus, Infusion};
    use crate::simulator::settings::SolverSettings;
    use nalgebra::DVector;

    #[test]
    fn simultaneous_events_keep_declaration_order() {
        let events = vec![
            Event::Bolus(Bolus::new(2.0, 1.0, 0)),
            Event::Bolus(Bolus::new(1.0, 2.0, 1)),
            Event::Bolus(Bolus::new(1.0, 3.0, 0)),
        ];
        let scheduler = EventScheduler::new(&events);
        let order: Vec<_> = scheduler
            .actions()
            .iter()
            .map(|a| match a.action {
                Action::AddAmount { amount, .. } => amount,
                Action::RateChange { .. } => unreachable!(),
            })
            .collect();
        assert_eq!(order, vec![2.0, 3.0, 1.0]);
    }

    #[test]
    fn infusions_switch_rates_on_and_off() {
        let events = vec![Event::Infusion(Infusion::new(1.0, 10.0, 0, 2.0))];
        let mut scheduler = EventScheduler::new(&events);
        assert_eq!(scheduler.times().collect::<Vec<_>>(), vec![1.0, 3.0]);

        let mut integrator =
            Integrator::new(0.0, DVector::zeros(1), vec![], &SolverSettings::default());
        let mut rates = vec![0.0];
        assert_eq!(scheduler.apply_due(0.5, &mut integrator, &mut rates), 0);
        assert_eq!(scheduler.apply_due(1.0, &mut integrator, &mut rates), 1);
        assert_eq!(rates[0], 5.0);
        assert_eq!(scheduler.next_time(), Some(3.0));
        scheduler.apply_due(3.0, &mut integrator, &mut rates);
        assert_eq!(rates[0], 0.0);
        assert!(scheduler.is_exhausted());
    }

    #[test]
    fn stop_times_merge_reports_and_events() {
        let stops = stop_times(&[0.0, 1.0, 2.0], vec![0.0, 1.5]);
        assert_eq!(
            stops,
            vec![
                StopTime {
                    time: 0.0,
                    report: true
                },
                StopTime {
                    time: 1.0,
                    report: true
                },
                StopTime {
                    time: 1.5,
                    report: false
                },
                StopTime {
                    time: 2.0,
                    report: true
                },
            ]
        );
    }
}
