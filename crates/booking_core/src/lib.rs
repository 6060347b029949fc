pub mod availability;
pub mod charge;
pub mod domain;
pub mod error;
pub mod ports;
pub mod session;
pub mod slots;

pub use availability::{Availability, AvailabilityQuery, AvailabilityResolver};
pub use charge::ChargeResolver;
pub use domain::{
    Appointment, AppointmentDraft, AppointmentId, AppointmentStatus, AvailableDoctor,
    BookingSelection, Charge, DoctorId,
};
pub use error::{BookingError, BookingResult, Field};
pub use ports::{
    AppointmentService, Clock, DirectoryService, Notice, NoticeLevel, NotificationSink, PortError,
    PortResult,
};
pub use session::{BookingEvent, BookingMode, BookingSession, BookingState, Command, RequestToken};
pub use slots::SlotPolicy;
