//! Controls how the simulation time is advanced

use kdam::BarExt;
use serde::{Deserialize, Serialize};

use cellular_potts_concepts::TimeError;

/// A [TimeEvent] describes that a certain action is to be executed after the next iteration step.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub enum TimeEvent {
    /// Saves a partial simulation run which is suitable for data readout but not full recovery of
    /// the simulation for restarting.
    PartialSave,
    /// Performs a complete save from which the simulation should be able to be recovered.
    FullSave,
}

/// Represents the next time point which is returned by the [TimeStepper::advance] method.
///
/// It is important to note that the absolute time value $t$ is not meant to be used
/// in updating steps but rather for saving results and annotating them correctly.
#[derive(Clone, Debug)]
pub struct NextTimePoint<F> {
    /// Time increment $dt$
    pub increment: F,
    /// Time value $t$
    pub time: F,
    /// Current iteration
    pub iteration: usize,
    /// Event at this iteration, or None
    pub event: Option<TimeEvent>,
}

/// Increments time of the simulation
///
/// In the future we hope to add adaptive steppers depending on a specified accuracy function.
pub trait TimeStepper<F> {
    /// Advances the time stepper to the next time point. Also returns if there is an event
    /// scheduled to take place and the next time value and iteration number
    #[must_use]
    fn advance(&mut self) -> Result<Option<NextTimePoint<F>>, TimeError>;

    /// Retrieves the last point at which the simulation was fully saved.
    fn get_last_full_save(&self) -> Option<(F, usize)>;

    /// Creates a bar that tracks the simulation progress
    fn initialize_bar(&self) -> Result<kdam::Bar, TimeError>;

    /// Update a given bar to show the current simulation state
    #[allow(unused)]
    fn update_bar(&self, bar: &mut kdam::Bar) -> Result<(), std::io::Error>;
}

/// Time stepping with a fixed time length
///
/// This time-stepper increments the time variable by the same length.
/// ```
/// # use cellular_potts_core::time::FixedStepsize;
/// let t0 = 0.0;
/// let dt = 0.1;
/// let t_max = 100.0;
/// let sampling_freq = 10;
/// let time_stepper = FixedStepsize::from_sampling_freq(t0, dt, t_max, sampling_freq).unwrap();
/// ```
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct FixedStepsize<F> {
    // The stepsize which was fixed
    dt: F,
    t0: F,
    current_time: F,
    current_iteration: usize,
    maximum_iterations: usize,
    // Take a sample every n iterations
    sampling_freq: usize,
    // Write a full save every n iterations, if specified
    checkpoint_freq: Option<usize>,
    past_full_saves: Vec<(F, usize)>,
}

impl<F> FixedStepsize<F>
where
    F: num::Float + num::FromPrimitive,
{
    /// Construct the stepper from the initial time, time increment, final time and the number
    /// of iterations between two sampled outputs.
    ///
    /// Samples are taken at iteration 0, every `sampling_freq` iterations thereafter and at the
    /// final iteration.
    pub fn from_sampling_freq(t0: F, dt: F, t_max: F, sampling_freq: usize) -> Result<Self, TimeError> {
        if t_max <= t0 {
            return Err(TimeError(
                "Invalid time configuration! Final time point is not after starting time point."
                    .to_owned(),
            ));
        }
        if sampling_freq == 0 {
            return Err(TimeError(
                "The sampling frequency must be at least one iteration.".to_owned(),
            ));
        }
        let maximum_iterations = ((t_max - t0) / dt)
            .round()
            .to_usize()
            .ok_or(TimeError(format!(
                "Could not convert the number of iterations of type {} to usize",
                std::any::type_name::<F>()
            )))?;
        if maximum_iterations == 0 {
            return Err(TimeError(
                "The specified time interval does not contain a single full increment.".to_owned(),
            ));
        }
        Ok(Self {
            dt,
            t0,
            current_time: t0,
            current_iteration: 0,
            maximum_iterations,
            sampling_freq,
            checkpoint_freq: None,
            past_full_saves: Vec::new(),
        })
    }

    /// Additionally schedule a [TimeEvent::FullSave] every `checkpoint_freq` iterations.
    ///
    /// When a full save and a sample coincide, the full save takes precedence.
    pub fn with_checkpoint_freq(mut self, checkpoint_freq: usize) -> Result<Self, TimeError> {
        if checkpoint_freq == 0 {
            return Err(TimeError(
                "The checkpoint frequency must be at least one iteration.".to_owned(),
            ));
        }
        self.checkpoint_freq = Some(checkpoint_freq);
        Ok(self)
    }

    /// Iteration the stepper is currently at.
    pub fn current_iteration(&self) -> usize {
        self.current_iteration
    }

    /// Time value the stepper is currently at.
    pub fn current_time(&self) -> F {
        self.current_time
    }

    fn event_at(&self, iteration: usize) -> Option<TimeEvent> {
        if let Some(freq) = self.checkpoint_freq {
            if iteration % freq == 0 {
                return Some(TimeEvent::FullSave);
            }
        }
        if iteration % self.sampling_freq == 0 || iteration == self.maximum_iterations {
            return Some(TimeEvent::PartialSave);
        }
        None
    }
}

impl<F> TimeStepper<F> for FixedStepsize<F>
where
    F: num::Float + num::FromPrimitive,
{
    fn advance(&mut self) -> Result<Option<NextTimePoint<F>>, TimeError> {
        self.current_iteration += 1;
        self.current_time = F::from_usize(self.current_iteration).ok_or(TimeError(
            "Error when casting from usize to floating point value".to_owned(),
        ))? * self.dt
            + self.t0;
        if self.current_iteration > self.maximum_iterations {
            return Ok(None);
        }
        let event = self.event_at(self.current_iteration);
        if event == Some(TimeEvent::FullSave) {
            self.past_full_saves
                .push((self.current_time, self.current_iteration));
        }
        Ok(Some(NextTimePoint {
            increment: self.dt,
            time: self.current_time,
            iteration: self.current_iteration,
            event,
        }))
    }

    fn get_last_full_save(&self) -> Option<(F, usize)> {
        self.past_full_saves.last().copied()
    }

    fn initialize_bar(&self) -> Result<kdam::Bar, TimeError> {
        let bar_format = "\
        {desc}{percentage:3.0}%|{animation}| \
        {count}/{total} \
        [{elapsed}, \
        {rate:.2}{unit}/s{postfix}]";
        Ok(kdam::BarBuilder::default()
            .total(self.maximum_iterations)
            .bar_format(bar_format)
            .dynamic_ncols(true)
            .build()?)
    }

    fn update_bar(&self, bar: &mut kdam::Bar) -> Result<(), std::io::Error> {
        let _ = bar.update(1)?;
        Ok(())
    }
}

#[cfg(test)]
mod test_time_stepper {
    use super::*;

    #[test]
    fn initialization() {
        let time_stepper = FixedStepsize::from_sampling_freq(1.0, 0.2, 5.0, 4).unwrap();
        assert_eq!(1.0, time_stepper.current_time);
        assert_eq!(0.2, time_stepper.dt);
        assert_eq!(0, time_stepper.current_iteration);
        assert_eq!(20, time_stepper.maximum_iterations);
    }

    #[test]
    fn progress_bar_can_be_built() {
        let time_stepper = FixedStepsize::from_sampling_freq(0.0, 0.1, 1.0, 1).unwrap();
        let bar = time_stepper.initialize_bar().unwrap();
        assert_eq!(10, bar.total);
    }

    #[test]
    fn invalid_configurations() {
        assert!(FixedStepsize::from_sampling_freq(1.0, 0.2, 1.0, 4).is_err());
        assert!(FixedStepsize::from_sampling_freq(0.0, 0.1, 10.0, 0).is_err());
        assert!(FixedStepsize::from_sampling_freq(0.0, 0.1, 10.0, 5)
            .unwrap()
            .with_checkpoint_freq(0)
            .is_err());
    }

    #[test]
    fn stepping_with_samples() {
        let t0 = 1.0;
        let dt = 0.2;
        let mut time_stepper = FixedStepsize::from_sampling_freq(t0, dt, 3.0, 5).unwrap();

        for i in 1..11 {
            let next = time_stepper.advance().unwrap().unwrap();
            assert_eq!(dt, next.increment);
            assert!((next.time - (t0 + i as f64 * dt)).abs() < 1e-12);
            assert_eq!(i, next.iteration);
            if i % 5 == 0 {
                assert_eq!(Some(TimeEvent::PartialSave), next.event);
            } else {
                assert_eq!(None, next.event);
            }
        }
        assert!(time_stepper.advance().unwrap().is_none());
    }

    #[test]
    fn final_iteration_is_sampled() {
        let mut time_stepper = FixedStepsize::from_sampling_freq(0.0, 0.1, 0.7, 3).unwrap();
        let mut last = None;
        while let Some(next) = time_stepper.advance().unwrap() {
            last = Some(next);
        }
        let last = last.unwrap();
        assert_eq!(7, last.iteration);
        assert_eq!(Some(TimeEvent::PartialSave), last.event);
    }

    #[test]
    fn full_saves_take_precedence() {
        let mut time_stepper = FixedStepsize::from_sampling_freq(0.0, 0.1, 1.2, 2)
            .unwrap()
            .with_checkpoint_freq(6)
            .unwrap();
        let mut full_saves = vec![];
        while let Some(next) = time_stepper.advance().unwrap() {
            match next.event {
                Some(TimeEvent::FullSave) => full_saves.push(next.iteration),
                Some(TimeEvent::PartialSave) => assert_eq!(0, next.iteration % 2),
                None => assert_ne!(0, next.iteration % 2),
            }
        }
        assert_eq!(vec![6, 12], full_saves);
        assert_eq!(Some(12), time_stepper.get_last_full_save().map(|x| x.1));
    }
}
