pub mod appointment;
pub mod owner;
pub mod reservation;
pub mod segment;

pub use appointment::{Appointment, AppointmentTemplate, BreakWindow, NewAppointment};
pub use owner::Owner;
pub use reservation::{CancelOutcome, Reservation, ReservationRequest, ReservationView};
pub use segment::{NewSegment, Segment};
