use failure::Fail;
use std::collections::HashMap;

use crate::ApiError;

bitflags! {
    /// Capabilities a user can hold over a content type.
    pub struct PermissionBits: i32 {
        /// Permission holder can ask for a record to be published or
        /// unpublished.
        const ASK_REQUEST = 0x00000001;
        /// Permission holder can publish and unpublish records directly, and
        /// reply to other users' requests.
        const PUBLISH = 0x00000002;
    }
}

impl PermissionBits {
    /// Verify that all required permissions are present.
    ///
    /// This is the same check as `self.contains(permissions)`, but returns an
    /// [`ApiError`].
    pub fn require(&self, permissions: PermissionBits)
    -> Result<(), RequirePermissionsError> {
        if self.contains(permissions) {
            Ok(())
        } else {
            Err(RequirePermissionsError(permissions - *self))
        }
    }
}

pub trait Permission {
    /// Permissions are stored as bit-flags, and this field is a mask of bits
    /// corresponding to this permission (or combination of permissions).
    fn bits() -> PermissionBits;
}

macro_rules! permission {
    (
        $name:ident = $value:expr
    ) => {
        pub struct $name;

        impl Permission for $name {
            #[inline]
            fn bits() -> PermissionBits {
                $value
            }
        }
    };
}

permission!(AskRequest = PermissionBits::ASK_REQUEST);
permission!(Publish = PermissionBits::PUBLISH);

#[derive(ApiError, Debug, Fail)]
#[api(code = "user:insufficient-permissions", kind = "Forbidden")]
#[fail(display = "Missing required permissions: {:?}", _0)]
pub struct RequirePermissionsError(pub PermissionBits);

/// Source of answers to "may this user do that to this content type".
///
/// Implementations must not have side effects, and must answer consistently
/// for the duration of a single workflow operation.
pub trait PermissionGate {
    /// Does `user` hold all of `permissions` for records of `content_type`?
    fn has_permission(&self, user: i32, content_type: &str, permissions: PermissionBits)
    -> bool;

    /// Verify that `user` holds permission `P` for `content_type`.
    fn require<P: Permission>(&self, user: i32, content_type: &str)
    -> Result<(), RequirePermissionsError>
    where
        Self: Sized,
    {
        if self.has_permission(user, content_type, P::bits()) {
            Ok(())
        } else {
            Err(RequirePermissionsError(P::bits()))
        }
    }
}

/// Fixed table of granted permissions.
#[derive(Clone, Debug, Default)]
pub struct StaticPermissions {
    grants: HashMap<(i32, String), PermissionBits>,
}

impl StaticPermissions {
    pub fn new() -> Self {
        StaticPermissions::default()
    }

    /// Grant `permissions` over `content_type` to `user`, in addition to
    /// those already granted.
    pub fn grant(&mut self, user: i32, content_type: &str, permissions: PermissionBits)
    -> &mut Self {
        *self.grants
            .entry((user, content_type.to_string()))
            .or_insert_with(PermissionBits::empty) |= permissions;
        self
    }

    /// Permissions `user` holds over `content_type`.
    pub fn permissions(&self, user: i32, content_type: &str) -> PermissionBits {
        self.grants
            .get(&(user, content_type.to_string()))
            .cloned()
            .unwrap_or_else(PermissionBits::empty)
    }
}

impl PermissionGate for StaticPermissions {
    fn has_permission(&self, user: i32, content_type: &str, permissions: PermissionBits)
    -> bool {
        self.permissions(user, content_type).contains(permissions)
    }
}

macro_rules! impl_permissons {
    {
        $( ($($name:ident),+) );+ $(;)*
    } => {
        $(
            impl<$($name),+> Permission for ($($name),+)
            where
                $($name: Permission,)+
            {
                #[inline]
                fn bits() -> PermissionBits {
                    $($name::bits())|+
                }
            }
        )+
    };
}

impl_permissons! {
    (A, B);
}
