use std::path::Path;

use bumpalo::Bump;

use super::*;
use crate::bytecode::{Instruction, disassemble};
use crate::emit::interop_id;
use crate::loader::MemoryLoader;
use crate::passes::OptimizePass;

use Opcode::*;

fn generate(source: &str, optimize: bool) -> GeneratedCode {
    let arena = Bump::new();
    let loader = MemoryLoader::new().with_file("p/main.py", source);
    let mut ctx = CompilationContext::new(&arena, &loader, "p");
    ctx.analyse_entry(Path::new("p/main.py"));
    assert!(!ctx.diagnostics.has_errors(), "{:?}", ctx.diagnostics.errors());
    if optimize {
        OptimizePass::new(&mut ctx).run();
    }
    CodeGenerator::new(&mut ctx).generate().unwrap()
}

fn method<'c>(code: &'c GeneratedCode, name: &str) -> &'c MethodInfo {
    code.methods
        .iter()
        .find(|method| method.name == name)
        .unwrap_or_else(|| panic!("no method '{name}' in {:?}", code.methods))
}

fn listing(code: &GeneratedCode, name: &str) -> Vec<Instruction> {
    let method = method(code, name);
    disassemble(&code.bytecode)
        .into_iter()
        .filter(|instruction| instruction.address >= method.start && instruction.address <= method.end)
        .collect()
}

fn ops(code: &GeneratedCode, name: &str) -> Vec<Opcode> {
    listing(code, name).into_iter().map(|instruction| instruction.opcode).collect()
}

#[test]
fn arithmetic_with_and_without_folding() {
    let source = "@public\ndef f() -> int:\n    return 1 + 2\n";

    assert_eq!(ops(&generate(source, false), "f"), vec![Push1, Push2, Add, Ret]);
    assert_eq!(ops(&generate(source, true), "f"), vec![Push3, Ret]);
}

#[test]
fn method_table() {
    let code = generate(
        "@public\ndef main(a: int) -> int:\n    return helper(a)\n\ndef helper(x: int) -> int:\n    return x + 1\n",
        false,
    );

    assert_eq!(code.methods.len(), 2);
    let main = method(&code, "main");
    assert!(main.public);
    assert_eq!(main.start, 0);
    assert_eq!(main.args, vec![("a".to_string(), Type::Int)]);
    assert_eq!(main.return_type, Type::Int);
    assert!(!method(&code, "helper").public);
    assert_eq!(method(&code, "helper").start, main.end + 1);
}

#[test]
fn calls_resolve_to_later_methods() {
    let code = generate(
        "@public\ndef main() -> int:\n    return helper(2)\n\ndef helper(x: int) -> int:\n    return x + 1\n",
        false,
    );

    let main = listing(&code, "main");
    assert_eq!(main.iter().map(|i| i.opcode).collect::<Vec<_>>(), vec![Push2, Call, Ret]);
    assert_eq!(main[1].target(), Some(method(&code, "helper").start));
    assert_eq!(ops(&code, "helper"), vec![InitSlot, LdArg0, Push1, Add, Ret]);
}

#[test]
fn locals_get_slots_per_method() {
    let code = generate(
        "def a() -> int:\n    x = 1\n    return x\n\ndef b() -> int:\n    y = 2\n    z = y\n    return z\n",
        false,
    );

    let a = listing(&code, "a");
    assert_eq!(a[0].opcode, InitSlot);
    assert_eq!(a[0].operand, vec![1, 0]);
    assert_eq!(ops(&code, "a"), vec![InitSlot, Push1, StLoc0, LdLoc0, Ret]);

    let b = listing(&code, "b");
    assert_eq!(b[0].operand, vec![2, 0]);
    assert_eq!(ops(&code, "b"), vec![InitSlot, Push2, StLoc0, LdLoc0, StLoc1, LdLoc1, Ret]);
}

#[test]
fn function_without_return_gets_one() {
    let code = generate("def f(x: int):\n    y = x\n", false);
    let f = listing(&code, "f");
    assert_eq!(f[0].operand, vec![1, 1]);
    assert_eq!(ops(&code, "f"), vec![InitSlot, LdArg0, StLoc0, Ret]);
}

#[test]
fn if_else_branches() {
    let code = generate(
        "def f(a: int) -> int:\n    if a > 0:\n        return 1\n    else:\n        return 2\n",
        false,
    );

    let f = listing(&code, "f");
    assert_eq!(
        f.iter().map(|i| i.opcode).collect::<Vec<_>>(),
        vec![InitSlot, LdArg0, Push0, Gt, JmpIfNot, Push1, Ret, Push2, Ret]
    );
    assert_eq!(f[4].target(), Some(f[7].address));
}

#[test]
fn if_without_else_falls_through() {
    let code = generate(
        "def f(a: int) -> int:\n    b = 0\n    if a > 0:\n        b = 1\n    return b\n",
        false,
    );

    let f = listing(&code, "f");
    assert_eq!(
        f.iter().map(|i| i.opcode).collect::<Vec<_>>(),
        vec![InitSlot, Push0, StLoc0, LdArg0, Push0, Gt, JmpIfNot, Push1, StLoc0, LdLoc0, Ret]
    );
    assert_eq!(f[6].target(), Some(f[9].address));
}

#[test]
fn while_loop_with_break() {
    let code = generate(
        "def f(n: int) -> int:\n    i = 0\n    while i < n:\n        if i == 3:\n            break\n        i = i + 1\n    return i\n",
        false,
    );

    let f = listing(&code, "f");
    assert_eq!(
        f.iter().map(|i| i.opcode).collect::<Vec<_>>(),
        vec![
            InitSlot, Push0, StLoc0, Jmp, LdLoc0, Push3, NumEqual, JmpIfNot, Jmp, LdLoc0, Push1, Add, StLoc0,
            LdLoc0, LdArg0, Lt, JmpIf, LdLoc0, Ret,
        ]
    );
    // Into the test, over the break, out of the loop, back to the body.
    assert_eq!(f[3].target(), Some(f[13].address));
    assert_eq!(f[7].target(), Some(f[9].address));
    assert_eq!(f[8].target(), Some(f[17].address));
    assert_eq!(f[16].target(), Some(f[4].address));
}

#[test]
fn for_loop_over_range() {
    let code = generate(
        "def f() -> int:\n    total = 0\n    for i in range(3):\n        total = total + i\n    return total\n",
        false,
    );

    let f = listing(&code, "f");
    let back = f.iter().find(|i| i.opcode == JmpIf).unwrap();
    assert!(back.target().unwrap() < back.address);
    assert_eq!(f.iter().filter(|i| i.opcode == Jmp).count(), 1);
    assert_eq!(f.last().unwrap().opcode, Ret);
}

#[test]
fn negative_list_index_is_corrected() {
    let code = generate(
        "from typing import List\n\ndef f(x: List[int]) -> int:\n    return x[-1]\n",
        true,
    );

    let f = listing(&code, "f");
    assert_eq!(
        f.iter().map(|i| i.opcode).collect::<Vec<_>>(),
        vec![InitSlot, LdArg0, PushM1, Dup, Sign, PushM1, JmpNe, Over, Size, Add, PickItem, Ret]
    );
    assert_eq!(f[6].target(), Some(f[10].address));
}

#[test]
fn untyped_containers_are_corrected() {
    let read = generate("def f(x, i: int) -> int:\n    return x[i]\n", false);
    assert_eq!(
        ops(&read, "f"),
        vec![InitSlot, LdArg0, LdArg1, Dup, Sign, PushM1, JmpNe, Over, Size, Add, PickItem, Ret]
    );

    let write = generate("def f(x, i: int):\n    x[i] = 1\n", false);
    assert_eq!(
        ops(&write, "f"),
        vec![InitSlot, LdArg0, LdArg1, Dup, Sign, PushM1, JmpNe, Over, Size, Add, Push1, SetItem, Ret]
    );
}

#[test]
fn untyped_index_is_not_corrected() {
    let code = generate("from typing import List\n\ndef f(x: List[int], i) -> int:\n    return x[i]\n", false);
    assert_eq!(ops(&code, "f"), vec![InitSlot, LdArg0, LdArg1, PickItem, Ret]);
}

#[test]
fn dict_lookup_has_no_correction() {
    let code = generate(
        "from typing import Dict\n\ndef f(d: Dict[str, int], k: str) -> int:\n    return d[k]\n",
        false,
    );
    assert_eq!(ops(&code, "f"), vec![InitSlot, LdArg0, LdArg1, PickItem, Ret]);
}

#[test]
fn string_index_and_slices() {
    let index = generate("def f(s: str) -> str:\n    return s[0]\n", false);
    assert!(ops(&index, "f").ends_with(&[Push1, Substr, Ret]));

    let both = generate("def f(s: str) -> str:\n    return s[1:3]\n", false);
    assert_eq!(ops(&both, "f"), vec![InitSlot, LdArg0, Push1, Push3, Over, Sub, Substr, Ret]);

    let head = generate("def f(s: str) -> str:\n    return s[:2]\n", false);
    assert_eq!(ops(&head, "f"), vec![InitSlot, LdArg0, Push2, Left, Ret]);

    let tail = generate("def f(s: str) -> str:\n    return s[2:]\n", false);
    assert_eq!(ops(&tail, "f"), vec![InitSlot, LdArg0, Push2, Over, Size, Swap, Sub, Right, Ret]);
}

#[test]
fn list_item_store_moves_the_value() {
    let code = generate(
        "from typing import List\n\ndef f(items: List[int]):\n    items[-1] = 7\n",
        true,
    );

    let f = listing(&code, "f");
    assert_eq!(
        f.iter().map(|i| i.opcode).collect::<Vec<_>>(),
        vec![InitSlot, LdArg0, PushM1, Dup, Sign, PushM1, JmpNe, Over, Size, Add, Push7, SetItem, Ret]
    );
    assert_eq!(f[6].target(), Some(f[10].address));
}

#[test]
fn is_none_evaluates_one_side() {
    let code = generate(
        "from typing import Optional\n\ndef f(x: Optional[int]) -> bool:\n    return x is None\n",
        false,
    );
    assert_eq!(ops(&code, "f"), vec![InitSlot, LdArg0, IsNull, Ret]);
}

#[test]
fn expression_statements_drop_their_value() {
    let code = generate("from typing import List\n\ndef f(x: List[int]):\n    len(x)\n", false);
    assert_eq!(ops(&code, "f"), vec![InitSlot, LdArg0, Size, Drop, Ret]);
}

#[test]
fn list_append() {
    let code = generate("from typing import List\n\ndef f(x: List[int]):\n    x.append(3)\n", false);
    assert_eq!(ops(&code, "f"), vec![InitSlot, LdArg0, Push3, Append, Ret]);
}

#[test]
fn sequence_and_dict_displays() {
    let list = generate("from typing import List\n\ndef f() -> List[int]:\n    return [1, 2]\n", false);
    assert_eq!(ops(&list, "f"), vec![Push2, Push1, Push2, Pack, Ret]);

    let empty = generate("from typing import List\n\ndef f() -> List[int]:\n    return []\n", false);
    assert_eq!(ops(&empty, "f"), vec![NewArray0, Ret]);

    let dict = generate(
        "from typing import Dict\n\ndef f() -> Dict[str, int]:\n    return {'a': 1}\n",
        false,
    );
    assert_eq!(ops(&dict, "f"), vec![NewMap, Dup, PushData1, Push1, SetItem, Ret]);
}

#[test]
fn assert_with_message() {
    let code = generate("def f(x: int):\n    assert x > 0, 'negative'\n", false);
    let f = listing(&code, "f");
    assert_eq!(
        f.iter().map(|i| i.opcode).collect::<Vec<_>>(),
        vec![InitSlot, LdArg0, Push0, Gt, PushData1, AssertMsg, Ret]
    );
    assert_eq!(f[4].data(), Some(&b"negative"[..]));
}

#[test]
fn interop_calls_use_syscalls() {
    let code = generate(
        "from interop import storage\n\n@public\ndef put(v: int):\n    storage.put('k', v)\n",
        false,
    );

    let put = listing(&code, "put");
    assert_eq!(
        put.iter().map(|i| i.opcode).collect::<Vec<_>>(),
        vec![InitSlot, LdArg0, PushData1, Syscall, Syscall, Ret]
    );
    assert_eq!(put[3].operand, interop_id("System.Storage.GetContext").to_vec());
    assert_eq!(put[4].operand, interop_id("System.Storage.Put").to_vec());
}

#[test]
fn globals_are_set_up_in_initialize() {
    let code = generate("counter: int = 5\n\n@public\ndef get() -> int:\n    return counter\n", false);

    let init = listing(&code, INITIALIZE);
    assert_eq!(
        init.iter().map(|i| i.opcode).collect::<Vec<_>>(),
        vec![InitSSlot, Push5, StSFld0, Ret]
    );
    assert_eq!(init[0].operand, vec![1]);
    assert!(method(&code, INITIALIZE).public);
    assert_eq!(ops(&code, "get"), vec![LdSFld0, Ret]);
}

#[test]
fn constants_are_inlined() {
    let code = generate("LIMIT = 10\n\n@public\ndef f() -> int:\n    return LIMIT\n", false);

    assert!(code.methods.iter().all(|method| method.name != INITIALIZE));
    assert_eq!(ops(&code, "f"), vec![Push10, Ret]);
}

#[test]
fn init_assignments_become_struct_fields() {
    let code = generate(
        "from builtin import public\n\n\n\
         class Example:\n    def __init__(self):\n        self.val1 = 1\n        self.val2 = 2\n\n\n\
         @public\ndef get_val(arg: int) -> Example:\n    obj = Example()\n    obj.val1 = arg\n    return obj\n",
        false,
    );

    assert_eq!(ops(&code, "get_val"), vec![
        InitSlot, PushNull, PushNull, Push2, PackStruct, Dup, Call, StLoc0, LdLoc0, Push0, LdArg0, SetItem, LdLoc0,
        Ret
    ]);
    assert_eq!(ops(&code, "Example.__init__"), vec![
        InitSlot, LdArg0, Push0, Push1, SetItem, LdArg0, Push1, Push2, SetItem, Ret
    ]);
}

#[test]
fn constructor_packs_fields_and_runs_init() {
    let code = generate(
        "class Point:\n    x: int = 0\n    y: int = 1\n\n    def __init__(self, x: int):\n        self.x = x\n\n\
         @public\ndef make() -> int:\n    p = Point(5)\n    return p.x\n",
        false,
    );

    let make = listing(&code, "make");
    assert_eq!(
        make.iter().map(|i| i.opcode).collect::<Vec<_>>(),
        vec![InitSlot, Push1, Push0, Push2, PackStruct, Push5, Over, Call, StLoc0, LdLoc0, Push0, PickItem, Ret]
    );
    assert_eq!(make[7].target(), Some(method(&code, "Point.__init__").start));

    let init = listing(&code, "Point.__init__");
    assert_eq!(init[0].operand, vec![0, 2]);
    assert_eq!(
        init.iter().map(|i| i.opcode).collect::<Vec<_>>(),
        vec![InitSlot, LdArg0, Push0, LdArg1, SetItem, Ret]
    );
}

