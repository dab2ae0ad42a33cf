// crates/fv_config/src/registry.rs

//! 名称注册表
//!
//! 求解器、预条件子、光顺器和离散格式均由配置中的字符串选择。
//! 每个枚举带一张静态表 `TABLE`，在反序列化时一次性解析为枚举值，
//! 之后的分发全部是 `match`。表中每个变体的第一个名称为规范名，
//! 序列化时输出规范名。

/// 定义带静态名称表的配置枚举
macro_rules! named_kind {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident ($kind:literal) {
            $(
                $(#[$vmeta:meta])*
                $variant:ident => $canon:literal $(| $alias:literal)*
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $(
                $(#[$vmeta])*
                $variant,
            )+
        }

        impl $name {
            /// 名称类别
            pub const KIND: &'static str = $kind;

            /// 静态名称表
            pub const TABLE: &'static [(&'static str, $name)] = &[
                $(
                    ($canon, $name::$variant),
                    $( ($alias, $name::$variant), )*
                )+
            ];

            /// 规范名称
            pub fn name(self) -> &'static str {
                match self {
                    $( $name::$variant => $canon, )+
                }
            }

            /// 全部规范名称
            pub fn canonical_names() -> Vec<&'static str> {
                vec![$($canon),+]
            }

            /// 按名称查表
            pub fn lookup(name: &str) -> Result<Self, $crate::error::ConfigError> {
                Self::TABLE
                    .iter()
                    .find(|(n, _)| *n == name)
                    .map(|(_, k)| *k)
                    .ok_or_else(|| $crate::error::ConfigError::UnknownName {
                        kind: $kind,
                        name: name.to_string(),
                        valid: Self::canonical_names().join(", "),
                    })
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::error::ConfigError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::lookup(s.trim())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.name())
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.name())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = <String as serde::Deserialize>::deserialize(deserializer)?;
                Self::lookup(s.trim()).map_err(serde::de::Error::custom)
            }
        }
    };
}

pub(crate) use named_kind;
