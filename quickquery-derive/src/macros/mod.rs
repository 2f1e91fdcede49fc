mod bind_enum;
mod bindable;

pub use bind_enum::derive_bind_enum;
pub use bindable::derive_bindable;
