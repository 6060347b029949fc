pub mod clock;
pub mod hospital;

pub use clock::SystemClock;
pub use hospital::HospitalApiAdapter;
