//! A scripted conversion peripheral for host-side testing and demos.
//!
//! Each input has a constant level and an optional script of raw results; reading an input pops
//! its script first and falls back to the level once the script runs dry.

use heapless::Deque;

use crate::{ConversionPeripheral, ScanAdc};

/// Number of inputs the simulation models; reads from higher selectors return 0.
pub const SIM_INPUTS: usize = 32;

/// Number of scripted results each input can queue.
pub const SCRIPT_DEPTH: usize = 64;

struct Input {
    level: u16,
    script: Deque<u16, SCRIPT_DEPTH>,
}

impl Input {
    const fn new() -> Self {
        Self {
            level: 0,
            script: Deque::new(),
        }
    }
}

/// A 10-bit conversion peripheral whose results are set by the test.
pub struct SimulatedPeripheral {
    inputs: [Input; SIM_INPUTS],
    selected: Option<u8>,
    armed: bool,
    signal_enabled: bool,
    reads: usize,
    selections: usize,
}

impl SimulatedPeripheral {
    /// Creates an idle peripheral with every input at level 0.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inputs: [const { Input::new() }; SIM_INPUTS],
            selected: None,
            armed: false,
            signal_enabled: false,
            reads: 0,
            selections: 0,
        }
    }

    /// Sets the level `selector` reads once its script is empty.
    pub fn set_level(&mut self, selector: u8, level: u16) {
        if let Some(input) = self.inputs.get_mut(usize::from(selector)) {
            input.level = level;
        }
    }

    /// Queues results to be returned, in order, by the next reads of `selector`.
    ///
    /// Returns how many were queued, which is less than `samples.len()` when the script is full or
    /// the selector is not simulated.
    pub fn push_samples(&mut self, selector: u8, samples: &[u16]) -> usize {
        let Some(input) = self.inputs.get_mut(usize::from(selector)) else {
            return 0;
        };
        samples
            .iter()
            .take_while(|&&sample| input.script.push_back(sample).is_ok())
            .count()
    }

    /// Returns the currently selected input.
    #[must_use]
    pub fn selected(&self) -> Option<u8> {
        self.selected
    }

    /// Returns whether continuous conversions are running.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Returns how many results have been read.
    #[must_use]
    pub fn conversions_read(&self) -> usize {
        self.reads
    }

    /// Returns how many times an input has been selected.
    #[must_use]
    pub fn selections(&self) -> usize {
        self.selections
    }

    /// Returns whether a finished conversion would raise the completion signal.
    #[must_use]
    pub fn raises_completion(&self) -> bool {
        self.armed && self.signal_enabled
    }
}

impl Default for SimulatedPeripheral {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversionPeripheral for SimulatedPeripheral {
    type Selector = u8;

    const RESOLUTION_BITS: u32 = 10;

    fn select_input(&mut self, selector: u8) {
        self.selected = Some(selector);
        self.selections += 1;
    }

    fn arm_continuous_trigger(&mut self) {
        self.armed = true;
    }

    fn disarm(&mut self) {
        self.armed = false;
    }

    fn enable_completion_signal(&mut self) {
        self.signal_enabled = true;
    }

    fn disable_completion_signal(&mut self) {
        self.signal_enabled = false;
    }

    fn completion_signal_enabled(&self) -> bool {
        self.signal_enabled
    }

    fn read_result(&mut self) -> u16 {
        self.reads += 1;
        let Some(input) = self
            .selected
            .and_then(|selector| self.inputs.get_mut(usize::from(selector)))
        else {
            return 0;
        };
        input.script.pop_front().unwrap_or(input.level)
    }
}

impl ScanAdc<SimulatedPeripheral> {
    /// Finishes up to `conversions` conversions, delivering the completion signal for each one the
    /// peripheral would raise it for.
    ///
    /// Returns the number of completion signals delivered.
    #[allow(clippy::must_use_candidate)]
    pub fn simulate_conversions(&self, conversions: usize) -> usize {
        let mut delivered = 0;
        for _ in 0..conversions {
            let raised = self
                .with_peripheral(|adc| adc.raises_completion())
                .unwrap_or(false);
            if raised {
                self.on_conversion_complete();
                delivered += 1;
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_then_level() {
        let mut adc = SimulatedPeripheral::new();
        adc.set_level(2, 50);
        assert_eq!(adc.push_samples(2, &[1, 2]), 2);
        adc.select_input(2);
        assert_eq!(adc.read_result(), 1);
        assert_eq!(adc.read_result(), 2);
        assert_eq!(adc.read_result(), 50);
        assert_eq!(adc.conversions_read(), 3);
    }

    #[test]
    fn unselected_and_unknown_inputs_read_zero() {
        let mut adc = SimulatedPeripheral::new();
        assert_eq!(adc.read_result(), 0);
        adc.select_input(200);
        assert_eq!(adc.read_result(), 0);
        assert_eq!(adc.push_samples(200, &[1]), 0);
    }

    #[test]
    fn script_capacity_is_bounded() {
        let mut adc = SimulatedPeripheral::new();
        let samples = [7u16; SCRIPT_DEPTH + 4];
        assert_eq!(adc.push_samples(0, &samples), SCRIPT_DEPTH);
    }

    #[test]
    fn completion_needs_arming_and_signal() {
        let mut adc = SimulatedPeripheral::new();
        assert!(!adc.raises_completion());
        adc.arm_continuous_trigger();
        assert!(!adc.raises_completion());
        adc.enable_completion_signal();
        assert!(adc.raises_completion());
        adc.disarm();
        assert!(!adc.raises_completion());
    }
}
