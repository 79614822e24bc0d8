use crate::store::StoreError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl From<String> for AppError {
    fn from(err: String) -> Self {
        Self(anyhow::Error::msg(err))
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        Self(anyhow::Error::msg(err.to_owned()))
    }
}

macro_rules! apperr_impl {
    ($E:ty) => {
        impl From<$E> for AppError {
            fn from(err: $E) -> Self {
                Self(anyhow::Error::from(err))
            }
        }
    };
}

apperr_impl!(StoreError);
apperr_impl!(serde_json::Error);

/// Collapses a whole-operation fault into an empty result at the API edge.
pub fn recover<T: Default>(result: AppResult<T>, operation: &str) -> T {
    match result {
        Ok(value) => value,
        Err(AppError(e)) => {
            tracing::error!("{operation} failed: {e:#}");
            T::default()
        }
    }
}
