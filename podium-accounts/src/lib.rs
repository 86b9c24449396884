pub mod accounts;
pub mod validation;

pub use accounts::AccountService;
pub use validation::{
    LoginRequest, SignupRequest, SpeakerSignupRequest, SpeakerUpdateRequest, VerifyOtpRequest,
};
