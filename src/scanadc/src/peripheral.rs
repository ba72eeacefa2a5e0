//! Provides the contract between the scan engine and the conversion hardware.

/// A conversion peripheral that digitizes one selected analog input per trigger and raises a
/// completion signal when each result is ready.
///
/// Implementations are thin wrappers over a chip's ADC registers. The scan engine never blocks on
/// the peripheral: it only reconfigures it and reads back finished results.
///
/// # Completion signal
///
/// The application binds the peripheral's completion interrupt to
/// [`ScanAdc::on_conversion_complete()`](crate::ScanAdc::on_conversion_complete). Once armed,
/// the peripheral is expected to keep converting back-to-back, so that selecting a new input takes
/// effect one conversion later; the scan engine discards that in-flight conversion.
pub trait ConversionPeripheral {
    /// Hardware identifier of an analog input (mux code, channel number, ...).
    type Selector: Copy;

    /// Number of significant bits in a result returned by [`Self::read_result()`].
    ///
    /// Must not exceed 16.
    const RESOLUTION_BITS: u32;

    /// Connects `selector` to the converter for subsequent conversions.
    fn select_input(&mut self, selector: Self::Selector);

    /// Starts continuous, back-to-back triggered conversions.
    fn arm_continuous_trigger(&mut self);

    /// Stops continuous conversions.
    fn disarm(&mut self);

    /// Enables the completion signal (interrupt).
    fn enable_completion_signal(&mut self);

    /// Disables the completion signal (interrupt).
    fn disable_completion_signal(&mut self);

    /// Returns whether the completion signal is currently enabled.
    #[must_use]
    fn completion_signal_enabled(&self) -> bool;

    /// Returns the result of the conversion that just completed.
    fn read_result(&mut self) -> u16;
}
