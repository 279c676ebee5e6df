//! Interop packages: contract storage, runtime services and cryptography.

use neopyc_core::{Constant, Type};

use super::TemplateOp::{Op, PushData, Syscall};
use super::{BuiltinMethod, PackageMember};
use crate::bytecode::Opcode;

const STORAGE_CONTEXT: Type = Type::Interop("StorageContext");

fn storage_key() -> Type {
    Type::union([Type::Bytes, Type::Str])
}

/// `interop.storage`. Every operation runs against the calling contract's
/// storage context, fetched right before the operation.
pub(super) fn storage() -> Vec<PackageMember> {
    vec![
        PackageMember::Method(BuiltinMethod::new(
            "get",
            vec![("key", storage_key())],
            Type::Bytes,
            vec![Syscall("System.Storage.GetContext"), Syscall("System.Storage.Get")],
        )),
        PackageMember::Method(BuiltinMethod::new(
            "put",
            vec![
                ("key", storage_key()),
                ("value", Type::union([Type::Bytes, Type::Int, Type::Str])),
            ],
            Type::None,
            vec![Syscall("System.Storage.GetContext"), Syscall("System.Storage.Put")],
        )),
        PackageMember::Method(BuiltinMethod::new(
            "delete",
            vec![("key", storage_key())],
            Type::None,
            vec![Syscall("System.Storage.GetContext"), Syscall("System.Storage.Delete")],
        )),
        PackageMember::Method(BuiltinMethod::new(
            "get_context",
            vec![],
            STORAGE_CONTEXT,
            vec![Syscall("System.Storage.GetContext")],
        )),
    ]
}

/// `interop.runtime`
pub(super) fn runtime() -> Vec<PackageMember> {
    vec![
        PackageMember::Method(BuiltinMethod::new(
            "check_witness",
            vec![("hash_or_pubkey", Type::Bytes)],
            Type::Bool,
            vec![Syscall("System.Runtime.CheckWitness")],
        )),
        PackageMember::Method(BuiltinMethod::new(
            "notify",
            vec![("state", Type::Any)],
            Type::None,
            vec![
                Op(Opcode::Push1),
                Op(Opcode::Pack),
                PushData(b"notify"),
                Syscall("System.Runtime.Notify"),
            ],
        )),
        PackageMember::Method(BuiltinMethod::new(
            "get_time",
            vec![],
            Type::Int,
            vec![Syscall("System.Runtime.GetTime")],
        )),
        PackageMember::Method(BuiltinMethod::new(
            "get_trigger",
            vec![],
            Type::Int,
            vec![Syscall("System.Runtime.GetTrigger")],
        )),
        PackageMember::Constant("APPLICATION", Constant::Int(0x40)),
        PackageMember::Constant("VERIFICATION", Constant::Int(0x20)),
    ]
}

/// `interop.crypto`
pub(super) fn crypto() -> Vec<PackageMember> {
    vec![PackageMember::Method(BuiltinMethod::new(
        "check_sig",
        vec![("pub_key", Type::Bytes), ("signature", Type::Bytes)],
        Type::Bool,
        vec![Syscall("System.Crypto.CheckSig")],
    ))]
}
