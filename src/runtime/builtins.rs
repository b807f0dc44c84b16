use crate::runtime::{
    builtin_function::{Arity, NativeFunction},
    errors::RuntimeError,
    gc::HeapError,
    module::ModuleId,
    value::Scalar,
    vm::VM,
};

/// The native library every module starts with.
pub const BUILTINS: &[NativeFunction] = &[
    NativeFunction { name: "+", arity: Arity::Min(0), func: builtin_add },
    NativeFunction { name: "-", arity: Arity::Min(1), func: builtin_sub },
    NativeFunction { name: "*", arity: Arity::Min(0), func: builtin_mul },
    NativeFunction { name: "<", arity: Arity::Exact(2), func: builtin_less },
    NativeFunction { name: "=", arity: Arity::Exact(2), func: builtin_num_eq },
    NativeFunction { name: "eq", arity: Arity::Exact(2), func: builtin_eq },
    NativeFunction { name: "car", arity: Arity::Exact(1), func: builtin_car },
    NativeFunction { name: "cdr", arity: Arity::Exact(1), func: builtin_cdr },
    NativeFunction { name: "cons", arity: Arity::Exact(2), func: builtin_cons },
    NativeFunction { name: "list", arity: Arity::Min(0), func: builtin_list },
    NativeFunction { name: "null", arity: Arity::Exact(1), func: builtin_null },
    NativeFunction { name: "print", arity: Arity::Exact(1), func: builtin_print },
];

pub fn get_builtin(name: &str) -> Option<&'static NativeFunction> {
    BUILTINS.iter().find(|b| b.name == name)
}

/// Binds every native into `module`'s function namespace.
pub fn install(vm: &mut VM, module: ModuleId) -> Result<(), HeapError> {
    for native in BUILTINS {
        let name = vm.intern(native.name)?;
        let cell = vm.heap.alloc_scalar(Scalar::NativeFunction(*native))?;
        vm.modules.get_mut(module).define_function(name, cell);
    }
    Ok(())
}

fn integers(vm: &VM, name: &'static str) -> Result<Vec<i64>, RuntimeError> {
    vm.args()
        .iter()
        .map(|arg| vm.integer_arg(name, *arg))
        .collect()
}

fn push_integer(vm: &mut VM, value: i64) -> Result<(), RuntimeError> {
    let cell = vm.heap.integer(value)?;
    vm.push(cell);
    Ok(())
}

fn builtin_add(vm: &mut VM) -> Result<(), RuntimeError> {
    let sum = integers(vm, "+")?
        .into_iter()
        .try_fold(0i64, i64::checked_add)
        .ok_or(RuntimeError::IntegerOverflow("+"))?;
    push_integer(vm, sum)
}

fn builtin_sub(vm: &mut VM) -> Result<(), RuntimeError> {
    let values = integers(vm, "-")?;
    let result = match values.split_first() {
        Some((only, [])) => only.checked_neg(),
        Some((first, rest)) => rest.iter().try_fold(*first, |acc, v| acc.checked_sub(*v)),
        None => Some(0),
    };
    push_integer(vm, result.ok_or(RuntimeError::IntegerOverflow("-"))?)
}

fn builtin_mul(vm: &mut VM) -> Result<(), RuntimeError> {
    let product = integers(vm, "*")?
        .into_iter()
        .try_fold(1i64, i64::checked_mul)
        .ok_or(RuntimeError::IntegerOverflow("*"))?;
    push_integer(vm, product)
}

fn builtin_less(vm: &mut VM) -> Result<(), RuntimeError> {
    let values = integers(vm, "<")?;
    let result = vm.boolean(values[0] < values[1]);
    vm.push(result);
    Ok(())
}

fn builtin_num_eq(vm: &mut VM) -> Result<(), RuntimeError> {
    let values = integers(vm, "=")?;
    let result = vm.boolean(values[0] == values[1]);
    vm.push(result);
    Ok(())
}

/// Identity, except that integers compare by value.
fn builtin_eq(vm: &mut VM) -> Result<(), RuntimeError> {
    let (a, b) = (vm.args()[0], vm.args()[1]);
    let same = a == b
        || matches!(
            (vm.heap.as_integer(a), vm.heap.as_integer(b)),
            (Some(x), Some(y)) if x == y
        );
    let result = vm.boolean(same);
    vm.push(result);
    Ok(())
}

fn builtin_car(vm: &mut VM) -> Result<(), RuntimeError> {
    let list = vm.args()[0];
    let value = match vm.heap.car(list) {
        Some(car) => car,
        None if list.is_null() => list,
        None => return Err(vm.type_error("car", "list", list)),
    };
    vm.push(value);
    Ok(())
}

fn builtin_cdr(vm: &mut VM) -> Result<(), RuntimeError> {
    let list = vm.args()[0];
    let value = match vm.heap.cdr(list) {
        Some(cdr) => cdr,
        None if list.is_null() => list,
        None => return Err(vm.type_error("cdr", "list", list)),
    };
    vm.push(value);
    Ok(())
}

fn builtin_cons(vm: &mut VM) -> Result<(), RuntimeError> {
    let (car, cdr) = (vm.args()[0], vm.args()[1]);
    let pair = vm.heap.cons(car, cdr)?;
    vm.push(pair);
    Ok(())
}

fn builtin_list(vm: &mut VM) -> Result<(), RuntimeError> {
    let items = vm.args().to_vec();
    let list = vm.heap.list(&items)?;
    vm.push(list);
    Ok(())
}

fn builtin_null(vm: &mut VM) -> Result<(), RuntimeError> {
    let result = vm.boolean(vm.args()[0].is_null());
    vm.push(result);
    Ok(())
}

fn builtin_print(vm: &mut VM) -> Result<(), RuntimeError> {
    let value = vm.args()[0];
    println!("{}", vm.display(value));
    vm.push(value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{BUILTINS, get_builtin};
    use crate::runtime::builtin_function::Arity;

    #[test]
    fn names_are_unique() {
        for (i, a) in BUILTINS.iter().enumerate() {
            assert!(
                BUILTINS[i + 1..].iter().all(|b| b.name != a.name),
                "duplicate builtin {}",
                a.name
            );
        }
    }

    #[test]
    fn lookup_by_name() {
        let car = get_builtin("car").unwrap();
        assert_eq!(car.arity, Arity::Exact(1));
        assert!(get_builtin("cadr").is_none());
    }
}
