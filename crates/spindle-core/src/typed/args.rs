//! TaskArgs trait - 型付き args の定義

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Ties an argument type to the task name it is scheduled under.
///
/// # 使用例
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct SendEmail {
///     to: String,
/// }
///
/// impl TaskArgs for SendEmail {
///     const NAME: &'static str = "mail.send.v1";
/// }
/// ```
pub trait TaskArgs: Serialize + DeserializeOwned + Send + Sync + 'static {
    const NAME: &'static str;
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::TaskArgs;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Resize {
        pub width: u32,
        pub height: u32,
    }

    impl TaskArgs for Resize {
        const NAME: &'static str = "image.resize.v1";
    }
}
