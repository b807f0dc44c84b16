use std::rc::Rc;

use crate::{
    bytecode::op_code::{Instructions, OpCode, make},
    runtime::{
        builtins::get_builtin,
        compiled_function::FunctionInfo,
        errors::RuntimeError,
        gc::CellRef,
        value::Scalar,
        vm::VM,
    },
};

fn new_vm() -> VM {
    VM::new().unwrap()
}

fn function_cell(vm: &mut VM, name: &str, params: usize, has_rest: bool, slots: usize, instructions: Instructions) -> CellRef {
    let module = vm.modules.get(vm.user_module()).cell;
    let name = if name.is_empty() {
        CellRef::NULL
    } else {
        vm.intern(name).unwrap()
    };
    let info = FunctionInfo {
        name,
        param_count: params,
        has_rest,
        slot_count: slots,
        constants: vec![],
        instructions,
        module,
    };
    vm.heap.alloc_scalar(Scalar::Function(Rc::new(info))).unwrap()
}

fn native_cell(vm: &mut VM, name: &str) -> CellRef {
    let native = *get_builtin(name).unwrap();
    vm.heap.alloc_scalar(Scalar::NativeFunction(native)).unwrap()
}

fn returns_local(slot: usize) -> Instructions {
    [make(OpCode::LoadLocal, &[slot]), make(OpCode::Return, &[])].concat()
}

#[test]
fn call_native_pushes_result_on_caller() {
    let mut vm = new_vm();
    let add = native_cell(&mut vm, "+");
    let one = vm.heap.integer(1).unwrap();
    let two = vm.heap.integer(2).unwrap();
    vm.push(add);
    vm.push(one);
    vm.push(two);

    vm.execute_call(2).unwrap();

    let result = vm.pop().unwrap();
    assert_eq!(vm.heap.as_integer(result), Some(3));
    assert_eq!(vm.frame_depth(), 1);
}

#[test]
fn call_function_pushes_frame_with_arguments() {
    let mut vm = new_vm();
    let f = function_cell(&mut vm, "second", 2, false, 3, returns_local(1));
    let a = vm.heap.integer(10).unwrap();
    let b = vm.heap.integer(20).unwrap();
    vm.push(f);
    vm.push(a);
    vm.push(b);

    vm.execute_call(2).unwrap();

    assert_eq!(vm.frame_depth(), 2);
    let frame = vm.current_frame();
    assert_eq!(frame.variables, vec![a, b, CellRef::NULL]);
    assert_eq!(frame.pc, 0);
    assert!(frame.stack.is_empty());

    vm.run(1).unwrap();
    assert_eq!(vm.pop(), Ok(b));
}

#[test]
fn apply_runs_bytecode_to_completion() {
    let mut vm = new_vm();
    let identity = function_cell(&mut vm, "identity", 1, false, 1, returns_local(0));
    let five = vm.heap.integer(5).unwrap();

    assert_eq!(vm.apply(identity, &[five]), Ok(five));
    assert_eq!(vm.frame_depth(), 1);
}

#[test]
fn wrong_arity_names_the_function() {
    let mut vm = new_vm();
    let anonymous = function_cell(&mut vm, "", 1, false, 1, returns_local(0));
    let named = function_cell(&mut vm, "pair", 2, false, 2, returns_local(0));
    let one = vm.heap.integer(1).unwrap();

    assert_eq!(
        vm.apply(anonymous, &[]),
        Err(RuntimeError::WrongArity {
            name: "anonymous".to_string(),
            expected: "1".to_string(),
            got: 0,
        })
    );
    assert_eq!(
        vm.apply(named, &[one]),
        Err(RuntimeError::WrongArity {
            name: "pair".to_string(),
            expected: "2".to_string(),
            got: 1,
        })
    );
}

#[test]
fn native_arity_is_checked_before_the_call() {
    let mut vm = new_vm();
    let car = native_cell(&mut vm, "car");
    let sub = native_cell(&mut vm, "-");

    assert_eq!(
        vm.apply(car, &[]),
        Err(RuntimeError::WrongArity {
            name: "car".to_string(),
            expected: "1".to_string(),
            got: 0,
        })
    );
    assert_eq!(
        vm.apply(sub, &[]),
        Err(RuntimeError::WrongArity {
            name: "-".to_string(),
            expected: "at least 1".to_string(),
            got: 0,
        })
    );
}

#[test]
fn rest_parameter_collects_surplus_arguments() {
    let mut vm = new_vm();
    let f = function_cell(&mut vm, "tail", 1, true, 2, returns_local(1));
    let a = vm.intern("a").unwrap();
    let b = vm.intern("b").unwrap();
    let c = vm.intern("c").unwrap();

    let rest = vm.apply(f, &[a, b, c]).unwrap();
    assert_eq!(vm.display(rest), "(b c)");

    let empty = vm.apply(f, &[a]).unwrap();
    assert!(empty.is_null());

    assert_eq!(
        vm.apply(f, &[]),
        Err(RuntimeError::WrongArity {
            name: "tail".to_string(),
            expected: "at least 1".to_string(),
            got: 0,
        })
    );
}

#[test]
fn non_callables_are_rejected() {
    let mut vm = new_vm();
    let five = vm.heap.integer(5).unwrap();

    assert_eq!(
        vm.apply(five, &[]),
        Err(RuntimeError::NotCallable("5".to_string()))
    );
    assert_eq!(
        vm.apply(CellRef::NULL, &[]),
        Err(RuntimeError::NotCallable("()".to_string()))
    );
}

#[test]
fn macros_cannot_be_called_at_run_time() {
    let mut vm = new_vm();
    let module = vm.modules.get(vm.user_module()).cell;
    let name = vm.intern("when").unwrap();
    let info = FunctionInfo {
        name,
        param_count: 0,
        has_rest: false,
        slot_count: 0,
        constants: vec![],
        instructions: [make(OpCode::PushNull, &[]), make(OpCode::Return, &[])].concat(),
        module,
    };
    let mac = vm.heap.alloc_scalar(Scalar::Macro(Rc::new(info))).unwrap();

    assert_eq!(
        vm.apply(mac, &[]),
        Err(RuntimeError::MacroCall("when".to_string()))
    );
}

#[test]
fn local_slots_start_null() {
    let mut vm = new_vm();
    let f = function_cell(&mut vm, "", 1, false, 4, returns_local(3));
    let one = vm.heap.integer(1).unwrap();

    assert_eq!(vm.apply(f, &[one]), Ok(CellRef::NULL));
}

#[test]
fn call_underflow_when_callee_is_missing() {
    let mut vm = new_vm();
    let one = vm.heap.integer(1).unwrap();
    vm.push(one);

    assert_eq!(vm.execute_call(1), Err(RuntimeError::StackUnderflow));
}
