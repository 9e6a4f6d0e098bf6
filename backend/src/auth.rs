//! Caller identity and the authorization predicates built on it.
//!
//! Authentication happens upstream: the gateway in front of this service
//! verifies the user's token and forwards the identity as `X-User-Id` and
//! `X-User-Role`. Requests without a usable user id are rejected with 401.

use crate::error::{Locale, ServiceError, ServiceResult};
use crate::store::ContractRecord;
use actix_web::dev::Payload;
use actix_web::http::header::{HeaderMap, ACCEPT_LANGUAGE};
use actix_web::{FromRequest, HttpRequest};
use common::model::user::Role;
use std::future::{ready, Ready};

pub const USER_ID_HEADER: &str = "X-User-Id";
pub const USER_ROLE_HEADER: &str = "X-User-Role";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Caller {
    pub user_id: i64,
    pub role: Role,
    pub locale: Locale,
}

impl Caller {
    pub fn new(user_id: i64, role: Role) -> Caller {
        Caller {
            user_id,
            role,
            locale: Locale::default(),
        }
    }

    /// Admins and directors see and manage every contract.
    pub fn is_privileged(&self) -> bool {
        matches!(self.role, Role::Admin | Role::Director)
    }

    fn from_headers(headers: &HeaderMap) -> ServiceResult<Caller> {
        let user_id = header(headers, USER_ID_HEADER)
            .and_then(|v| v.trim().parse::<i64>().ok())
            .ok_or(ServiceError::Unauthorized)?;
        let role = match header(headers, USER_ROLE_HEADER) {
            Some(raw) => raw.parse::<Role>().unwrap_or_else(|e| {
                log::warn!("{}; treating user {} as {:?}", e, user_id, Role::Default);
                Role::Default
            }),
            None => Role::Default,
        };
        let locale = header(headers, ACCEPT_LANGUAGE.as_str())
            .map(Locale::from_accept_language)
            .unwrap_or_default();

        Ok(Caller {
            user_id,
            role,
            locale,
        })
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

impl FromRequest for Caller {
    type Error = ServiceError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(Caller::from_headers(req.headers()))
    }
}

/// The contract's creator, users it was shared with and privileged roles.
pub fn can_access_contract(caller: &Caller, contract: &ContractRecord) -> bool {
    caller.is_privileged()
        || contract.created_by == caller.user_id
        || contract.allowed_users.contains(&caller.user_id)
}

pub fn require_admin(caller: &Caller) -> ServiceResult<()> {
    if caller.role == Role::Admin {
        Ok(())
    } else {
        Err(ServiceError::AccessDenied)
    }
}

pub fn require_privileged(caller: &Caller) -> ServiceResult<()> {
    if caller.is_privileged() {
        Ok(())
    } else {
        Err(ServiceError::AccessDenied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    fn contract(created_by: i64, allowed_users: Vec<i64>) -> ContractRecord {
        ContractRecord {
            id: 1,
            template_id: 1,
            template_name: "T".into(),
            client_passport: None,
            docx_path: None,
            pdf_path: None,
            created_by,
            allowed_users,
        }
    }

    #[test]
    fn access_is_granted_to_creator_allowed_users_and_privileged_roles() {
        let c = contract(1, vec![2]);
        assert!(can_access_contract(&Caller::new(1, Role::Operator), &c));
        assert!(can_access_contract(&Caller::new(2, Role::Default), &c));
        assert!(can_access_contract(&Caller::new(3, Role::Director), &c));
        assert!(can_access_contract(&Caller::new(3, Role::Admin), &c));
        assert!(!can_access_contract(&Caller::new(3, Role::Operator), &c));
    }

    #[test]
    fn only_admins_pass_the_admin_check() {
        assert!(require_admin(&Caller::new(1, Role::Admin)).is_ok());
        assert!(require_admin(&Caller::new(1, Role::Director)).is_err());
        assert!(require_privileged(&Caller::new(1, Role::Director)).is_ok());
        assert!(require_privileged(&Caller::new(1, Role::Operator)).is_err());
    }

    #[actix_web::test]
    async fn caller_is_read_from_gateway_headers() {
        let req = TestRequest::default()
            .insert_header((USER_ID_HEADER, "42"))
            .insert_header((USER_ROLE_HEADER, "ROLE_ADMIN"))
            .insert_header((ACCEPT_LANGUAGE, "ru-RU,ru;q=0.9"))
            .to_http_request();
        let caller = Caller::extract(&req).await.unwrap();
        assert_eq!(caller.user_id, 42);
        assert_eq!(caller.role, Role::Admin);
        assert_eq!(caller.locale, Locale::Ru);
    }

    #[actix_web::test]
    async fn missing_user_id_is_unauthorized() {
        let req = TestRequest::default()
            .insert_header((USER_ROLE_HEADER, "ADMIN"))
            .to_http_request();
        assert!(matches!(
            Caller::extract(&req).await,
            Err(ServiceError::Unauthorized)
        ));

        let req = TestRequest::default()
            .insert_header((USER_ID_HEADER, "abc"))
            .to_http_request();
        assert!(Caller::extract(&req).await.is_err());
    }
}
