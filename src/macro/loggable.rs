pub use crate::loggable;

/// Declares an error or log-entry enum whose variants each carry a display
/// message and a `tracing::Level`.
#[macro_export]
macro_rules! loggable {
    (
        $enum_name:ident {
            $(
                $(#[doc = $doc:expr])*
                #[error($msg:expr)]
                $variant:ident $({ $($field:ident: $field_type:ty),* $(,)? })? => $level:expr
                $(,)?
            )*
        }
    ) => {
        #[allow(dead_code)]
        #[derive(Debug, Clone, PartialEq, thiserror::Error, serde::Serialize, serde::Deserialize)]
        pub enum $enum_name {
            $(
                $(#[doc = $doc])*
                #[error($msg)]
                $variant $({ $($field: $field_type),* })?,
            )*
        }

        impl $enum_name {
            #[allow(dead_code)]
            pub fn level(&self) -> tracing::Level {
                match self {
                    $(Self::$variant $({ $($field: _),* })? => $level,)*
                }
            }

            #[allow(dead_code)]
            pub fn log(&self) {
                let level = self.level();
                let message = self.to_string();

                match level {
                    tracing::Level::ERROR => tracing::error!("{}", message),
                    tracing::Level::WARN => tracing::warn!("{}", message),
                    tracing::Level::INFO => tracing::info!("{}", message),
                    tracing::Level::DEBUG => tracing::debug!("{}", message),
                    tracing::Level::TRACE => tracing::trace!("{}", message),
                }
            }
        }
    };
}
